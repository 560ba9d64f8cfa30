mod common;

use std::collections::BTreeMap;

use common::{cluster, service, task, Answer, Call, MockGateway, ScriptedPicker, SharedBuf, ARN};
use iecs::commands::{exec_command, ExecArgs, Invocation};
use iecs::{
    exit_code_for_error, CommandHint, Filters, FormStyle, IecsError, Pinned, SessionBroker,
    Selector,
};
use tokio_util::sync::CancellationToken;

fn container(name: &str) -> Pinned {
    Pinned {
        task: None,
        container: Some(name.to_string()),
    }
}

/// Two clusters; `my-cluster` runs `api` and `worker`, `empty-cluster` runs nothing.
fn two_cluster_gateway() -> MockGateway {
    let mine = cluster("my-cluster");
    let empty = cluster("empty-cluster");
    let api = service(&mine, "api", "td-api:1");
    let worker = service(&mine, "worker", "td-worker:1");
    let t = task(&mine, "t-1", &[("app", "rt-app"), ("envoy", "rt-envoy")]);
    let mut service_tasks = BTreeMap::new();
    service_tasks.insert("worker".to_string(), vec![t.arn.clone()]);
    MockGateway {
        clusters: vec![empty, mine],
        services: vec![api, worker],
        tasks: vec![t],
        service_tasks,
        region: Some("us-east-1".to_string()),
        ..MockGateway::default()
    }
}

#[tokio::test]
async fn single_cluster_is_picked_without_prompt() {
    let c1 = cluster("c1");
    let gw = MockGateway {
        clusters: vec![c1.clone()],
        ..MockGateway::default()
    };
    let picker = ScriptedPicker::default();
    let cancel = CancellationToken::new();
    let out = SharedBuf::default();

    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(out.clone()));
    let picked = selector.select_cluster().await.unwrap();

    assert_eq!(picked, c1);
    assert!(picker.prompts().is_empty());
    assert_eq!(
        gw.calls(),
        vec![Call::ListClusters, Call::DescribeCluster(c1.arn.clone())]
    );
    assert!(out
        .contents()
        .contains(&format!("Selected cluster: {ARN}:cluster/c1")));
}

#[tokio::test]
async fn cluster_listing_error_surfaces_unchanged() {
    let gw = MockGateway {
        list_clusters_error: Some("remote timeout".to_string()),
        ..MockGateway::default()
    };
    let picker = ScriptedPicker::default();
    let cancel = CancellationToken::new();
    let inv = Invocation {
        gateway: &gw,
        picker: &picker,
        cancel: &cancel,
        out: Box::new(SharedBuf::default()),
        title_code: None,
        form: FormStyle::Steps,
    };
    let args = ExecArgs {
        command: "/bin/bash".to_string(),
        interactive: true,
        pinned: Pinned::default(),
        filters: Filters::default(),
    };

    let err = exec_command(inv, &SessionBroker::at("/nonexistent/broker"), &args)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "remote timeout");
    assert_eq!(exit_code_for_error(&err), 1);
    assert_eq!(gw.calls(), vec![Call::ListClusters]);
}

#[tokio::test]
async fn describe_returning_another_entity_is_not_found() {
    let c1 = cluster("c1");
    let gw = MockGateway {
        clusters: vec![c1.clone()],
        describe_cluster_override: Some(cluster("c2")),
        ..MockGateway::default()
    };
    let picker = ScriptedPicker::default();
    let cancel = CancellationToken::new();

    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(SharedBuf::default()));
    let err = selector.select_cluster().await.unwrap_err();
    assert!(matches!(err, IecsError::NotFound(_)), "{err:?}");
    assert_eq!(err.to_string(), format!("cluster {} not found", c1.arn));
}

#[tokio::test]
async fn steps_pipeline_prompts_only_where_there_is_a_choice() {
    let gw = two_cluster_gateway();
    // cluster: my-cluster, service: worker, container: envoy. One task, no prompt.
    let picker = ScriptedPicker::new(vec![Answer::One(1), Answer::One(1), Answer::One(1)]);
    let cancel = CancellationToken::new();
    let out = SharedBuf::default();

    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(out.clone()));
    let target = selector
        .exec_target(FormStyle::Steps, &Pinned::default())
        .await
        .unwrap();

    assert_eq!(target.cluster.name, "my-cluster");
    assert_eq!(target.service.name, "worker");
    assert_eq!(target.container.name, "envoy");
    assert_eq!(target.container.runtime_id.as_deref(), Some("rt-envoy"));

    let prompts = picker.prompts();
    let titles: Vec<&str> = prompts.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(titles, ["cluster", "service", "container"]);
    assert_eq!(prompts[0].1, ["empty-cluster", "my-cluster"]);
    assert_eq!(prompts[1].1, ["api", "worker"]);

    // Tasks are listed by service name, scoped to the picked cluster's reference.
    assert!(gw.called(|c| *c
        == Call::ListTasks(format!("{ARN}:cluster/my-cluster"), "worker".to_string())));

    let text = out.contents();
    let order: Vec<&str> = text
        .lines()
        .filter_map(|l| l.strip_prefix("Selected "))
        .map(|l| l.split(':').next().unwrap_or_default())
        .collect();
    assert_eq!(order, ["cluster", "service", "task", "container"]);
}

#[tokio::test]
async fn filters_narrow_before_the_fast_path() {
    let gw = two_cluster_gateway();
    let picker = ScriptedPicker::default();
    let cancel = CancellationToken::new();
    let filters = Filters::new(Some("^my-"), Some("work")).unwrap();

    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(SharedBuf::default()))
        .with_filters(filters);
    let target = selector
        .exec_target(FormStyle::Steps, &container("app"))
        .await
        .unwrap();

    assert!(picker.prompts().is_empty());
    assert_eq!(target.service.name, "worker");
    assert_eq!(target.container.runtime_id.as_deref(), Some("rt-app"));
}

#[tokio::test]
async fn filter_without_match_names_the_pattern() {
    let gw = two_cluster_gateway();
    let picker = ScriptedPicker::default();
    let cancel = CancellationToken::new();

    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(SharedBuf::default()))
        .with_filters(Filters::new(Some("^prod"), None).unwrap());
    let err = selector.select_cluster().await.unwrap_err();
    assert_eq!(err.to_string(), "no cluster matches --cluster \"^prod\"");
    assert!(!gw.called(|c| matches!(c, Call::DescribeCluster(_))));
}

#[tokio::test]
async fn unknown_container_name_is_not_found() {
    let gw = two_cluster_gateway();
    let picker = ScriptedPicker::new(vec![Answer::One(1), Answer::One(1)]);
    let cancel = CancellationToken::new();

    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(SharedBuf::default()));
    let err = selector
        .exec_target(FormStyle::Steps, &container("sidecar"))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("container sidecar not found in task"));
}

#[tokio::test]
async fn dismissed_prompt_is_cancelled() {
    let gw = two_cluster_gateway();
    // Script runs dry on the first prompt, which the picker reports as Cancelled.
    let picker = ScriptedPicker::default();
    let cancel = CancellationToken::new();

    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(SharedBuf::default()));
    let err = selector
        .exec_target(FormStyle::Steps, &Pinned::default())
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(exit_code_for_error(&err), 130);
    assert_eq!(gw.calls(), vec![Call::ListClusters]);
}

#[tokio::test]
async fn cascade_goes_back_when_a_cluster_has_no_services() {
    let gw = two_cluster_gateway();
    // empty-cluster first, then my-cluster after the form steps back, then worker, then app.
    let picker = ScriptedPicker::new(vec![
        Answer::One(0),
        Answer::One(1),
        Answer::One(1),
        Answer::One(0),
    ]);
    let cancel = CancellationToken::new();
    let out = SharedBuf::default();

    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(out.clone()));
    let target = selector
        .exec_target(FormStyle::Cascade, &Pinned::default())
        .await
        .unwrap();

    assert_eq!(target.cluster.name, "my-cluster");
    assert_eq!(target.service.name, "worker");
    assert_eq!(target.container.name, "app");

    let titles: Vec<String> = picker.prompts().into_iter().map(|(t, _)| t).collect();
    assert_eq!(titles, ["cluster", "cluster", "service", "container"]);

    // The describe pass after submission confirms every answer.
    assert!(gw.called(|c| *c == Call::DescribeCluster(format!("{ARN}:cluster/my-cluster"))));
    assert!(out.contents().contains("Selected container: app"));
}

#[tokio::test]
async fn cascade_listing_error_surfaces_unchanged() {
    let gw = MockGateway {
        list_clusters_error: Some("remote timeout".to_string()),
        ..MockGateway::default()
    };
    let picker = ScriptedPicker::default();
    let cancel = CancellationToken::new();

    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(SharedBuf::default()));
    let err = selector
        .log_target(FormStyle::Cascade, &Pinned::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "remote timeout");
    assert_eq!(gw.calls(), vec![Call::ListClusters]);
}

/// `my-cluster` and `my-cluster-2` both run `api`; `my-cluster` also runs `api-v2`, and its
/// `api` has two tasks with two containers each.
fn lookalike_gateway() -> MockGateway {
    let mine = cluster("my-cluster");
    let other = cluster("my-cluster-2");
    let api = service(&mine, "api", "td-api:1");
    let api_v2 = service(&mine, "api-v2", "td-api:2");
    let other_api = service(&other, "api", "td-api:1");
    let t1 = task(&mine, "t-1", &[("app", "rt-1"), ("envoy", "rt-1e")]);
    let t2 = task(&mine, "t-2", &[("app", "rt-2"), ("envoy", "rt-2e")]);
    let mut service_tasks = BTreeMap::new();
    service_tasks.insert("api".to_string(), vec![t1.arn.clone(), t2.arn.clone()]);
    MockGateway {
        clusters: vec![mine, other],
        services: vec![api, api_v2, other_api],
        tasks: vec![t1, t2],
        service_tasks,
        ..MockGateway::default()
    }
}

#[tokio::test]
async fn hinted_flags_replay_the_selection_without_prompts() {
    let gw = lookalike_gateway();
    // my-cluster, api, t-2, app
    let picker = ScriptedPicker::new(vec![
        Answer::One(0),
        Answer::One(0),
        Answer::One(1),
        Answer::One(0),
    ]);
    let cancel = CancellationToken::new();
    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(SharedBuf::default()));
    let picked = selector
        .exec_target(FormStyle::Steps, &Pinned::default())
        .await
        .unwrap();
    assert_eq!(picker.prompts().len(), 4);

    let hint = CommandHint::new(&picked, "/bin/sh -c \"id\"", false);
    assert_eq!(
        hint.to_string(),
        "iecs exec --cluster '^my-cluster$' --service '^api$' --task t-2 --container app \
         --interactive false --command \"/bin/sh -c \\\"id\\\"\""
    );

    for form in [FormStyle::Steps, FormStyle::Cascade] {
        let gw = lookalike_gateway();
        let picker = ScriptedPicker::default();
        let filters = Filters::new(Some(&hint.cluster), Some(&hint.service)).unwrap();
        let pinned = Pinned {
            task: Some(hint.task.clone()),
            container: Some(hint.container.clone()),
        };
        let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(SharedBuf::default()))
            .with_filters(filters);
        let replayed = selector.exec_target(form, &pinned).await.unwrap();

        assert!(picker.prompts().is_empty(), "{form:?}: {:?}", picker.prompts());
        assert_eq!(replayed.cluster, picked.cluster);
        assert_eq!(replayed.service, picked.service);
        assert_eq!(replayed.task.arn, picked.task.arn);
        assert_eq!(replayed.container, picked.container);
        // A pinned task is described, never listed.
        assert!(!gw.called(|c| matches!(c, Call::ListTasks(..))));
    }
}

#[tokio::test]
async fn unknown_pinned_task_is_not_found() {
    let gw = lookalike_gateway();
    let picker = ScriptedPicker::new(vec![Answer::One(0), Answer::One(0)]);
    let cancel = CancellationToken::new();
    let pinned = Pinned {
        task: Some("t-9".to_string()),
        container: None,
    };

    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(SharedBuf::default()));
    let err = selector
        .exec_target(FormStyle::Steps, &pinned)
        .await
        .unwrap_err();
    assert!(matches!(err, IecsError::NotFound(_)), "{err:?}");
    assert_eq!(
        gw.calls().last(),
        Some(&Call::DescribeTask(
            format!("{ARN}:cluster/my-cluster"),
            "t-9".to_string()
        ))
    );
}

#[tokio::test]
async fn cancelling_mid_stage_stops_the_pipeline() {
    use std::time::Duration;

    let gw = MockGateway {
        hang_list_services: true,
        ..two_cluster_gateway()
    };
    // my-cluster; the service listing then hangs until cancelled.
    let picker = ScriptedPicker::new(vec![Answer::One(1)]);
    let cancel = CancellationToken::new();
    let mut selector = Selector::new(&gw, &picker, &cancel, Box::new(SharedBuf::default()));

    let pinned = Pinned::default();
    let pipeline = selector.exec_target(FormStyle::Steps, &pinned);
    let interrupt = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    };
    let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(pipeline, interrupt)
    })
    .await
    .expect("pipeline did not stop after cancellation");

    let err = result.unwrap_err();
    assert!(err.is_cancelled(), "{err:?}");
    assert_eq!(exit_code_for_error(&err), 130);
    assert_eq!(
        gw.calls().last(),
        Some(&Call::ListServices(format!("{ARN}:cluster/my-cluster")))
    );
}
