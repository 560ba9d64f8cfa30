//! Cascading multi-field form.
//!
//! Fields are answered in order. A field's options are either fixed or produced on demand
//! from the answers given so far; a deferred producer is re-run whenever the answer it
//! depends on changes. Producer failures never abort the form: they are logged and the
//! field shows no options, which sends the operator back to the last field they answered.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::color::{color_enabled_stderr, log_warn_stderr};
use crate::errors::IecsError;
use crate::picker::{pick_many, pick_one, Picker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormOption {
    pub label: String,
    pub value: String,
}

impl FormOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        FormOption {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Answers so far, keyed by field key. Single-choice fields hold one value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers(BTreeMap<&'static str, Vec<String>>);

impl Answers {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set(&mut self, key: &'static str, values: Vec<String>) {
        self.0.insert(key, values);
    }

    fn clear(&mut self, key: &str) {
        self.0.remove(key);
    }
}

#[async_trait]
pub trait OptionSource: Send + Sync {
    async fn options(
        &self,
        answers: &Answers,
        cancel: &CancellationToken,
    ) -> Result<Vec<FormOption>, IecsError>;
}

pub enum Options<'a> {
    Static(Vec<FormOption>),
    Deferred {
        /// Answer whose change re-runs the producer; `None` runs it once.
        depends_on: Option<&'static str>,
        source: Box<dyn OptionSource + 'a>,
    },
}

pub struct Field<'a> {
    pub key: &'static str,
    pub title: &'static str,
    pub options: Options<'a>,
    pub multi: bool,
}

impl<'a> Field<'a> {
    pub fn select(key: &'static str, title: &'static str, options: Options<'a>) -> Self {
        Field {
            key,
            title,
            options,
            multi: false,
        }
    }

    pub fn multi_select(key: &'static str, title: &'static str, options: Options<'a>) -> Self {
        Field {
            key,
            title,
            options,
            multi: true,
        }
    }
}

pub struct Form<'a> {
    fields: Vec<Field<'a>>,
}

struct Cached {
    dependency: Option<Vec<String>>,
    options: Vec<FormOption>,
}

impl<'a> Form<'a> {
    pub fn new(fields: Vec<Field<'a>>) -> Self {
        Form { fields }
    }

    async fn options_for(
        &self,
        idx: usize,
        answers: &Answers,
        cache: &mut [Option<Cached>],
        cancel: &CancellationToken,
    ) -> Result<Vec<FormOption>, IecsError> {
        let field = &self.fields[idx];
        let (depends_on, source) = match &field.options {
            Options::Static(opts) => return Ok(opts.clone()),
            Options::Deferred { depends_on, source } => (depends_on, source),
        };
        let dependency = depends_on.map(|k| answers.get_all(k).to_vec());
        if let Some(c) = &cache[idx] {
            if c.dependency == dependency {
                return Ok(c.options.clone());
            }
        }
        let options = match source.options(answers, cancel).await {
            Ok(o) => o,
            Err(IecsError::Cancelled) => return Err(IecsError::Cancelled),
            Err(e) => {
                tracing::warn!(
                    field = field.key,
                    error = %e,
                    "option producer failed; showing no options"
                );
                Vec::new()
            }
        };
        cache[idx] = Some(Cached {
            dependency,
            options: options.clone(),
        });
        Ok(options)
    }

    /// Ask every field in order and return the submitted answers.
    pub async fn run(
        &self,
        picker: &dyn Picker,
        cancel: &CancellationToken,
    ) -> Result<Answers, IecsError> {
        let mut answers = Answers::default();
        let mut cache: Vec<Option<Cached>> = self.fields.iter().map(|_| None).collect();
        let mut prompted = vec![false; self.fields.len()];
        let mut idx = 0;

        while idx < self.fields.len() {
            if cancel.is_cancelled() {
                return Err(IecsError::Cancelled);
            }
            let field = &self.fields[idx];
            let options = self.options_for(idx, &answers, &mut cache, cancel).await?;

            if options.is_empty() {
                let Some(back) = (0..idx).rev().find(|j| prompted[*j]) else {
                    return Err(IecsError::not_found(format!("no {} found", field.title)));
                };
                log_warn_stderr(
                    color_enabled_stderr(),
                    &format!(
                        "no {} available for that {}; choose another",
                        field.title, self.fields[back].title
                    ),
                );
                for j in back..self.fields.len() {
                    answers.clear(self.fields[j].key);
                    prompted[j] = false;
                }
                idx = back;
                continue;
            }

            let labels: Vec<String> = options.iter().map(|o| o.label.clone()).collect();
            let picked = if field.multi {
                pick_many(picker, field.title, &labels, cancel).await?
            } else {
                vec![pick_one(picker, field.title, &labels, cancel).await?]
            };
            prompted[idx] = options.len() > 1;
            answers.set(
                field.key,
                picked.into_iter().map(|i| options[i].value.clone()).collect(),
            );
            idx += 1;
        }
        Ok(answers)
    }
}
