// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::arch::{ArchGraph, DeviceKind, RetryPolicy};
    use crate::backends::local::{Generate, MemorySink, MemorySource, NullSink, Scale};
    use crate::buffer::Buffer;
    use crate::config::{TaskConfig, TaskRegistry};
    use crate::engine::{FixedScheduler, SchedulerOptions};
    use crate::errors::{ConnectionError, ExecutionError};
    use crate::graph::{EdgeId, TaskGraph};
    use crate::proto::remote_v1::{DTypeCode, Data, FailureKind, Hello, RejectReason, Submit};
    use crate::proto::Body;
    use crate::remote::{codec, Daemon, DaemonConfig, Session};
    use crate::traits::Scheduler;

    fn config(gpus: usize) -> DaemonConfig {
        DaemonConfig {
            listen: "127.0.0.1:0".into(),
            gpus: Some(gpus),
            grace_period: Duration::from_millis(200),
            ..DaemonConfig::default()
        }
    }

    async fn started(gpus: usize) -> (Daemon, String) {
        let mut daemon = Daemon::new(config(gpus), Arc::new(TaskRegistry::with_builtins()));
        let address = daemon.start().await.unwrap();
        (daemon, format!("tcp://{address}"))
    }

    fn frames(count: usize) -> Vec<Buffer> {
        (0..count)
            .map(|i| Buffer::from_vec([2, 2], vec![i as f32; 4]).unwrap())
            .collect()
    }

    /// Source -> scale (remote) -> sink, with the scale pinned to `node`.
    fn scale_graph(input: Vec<Buffer>, sink: &MemorySink, remote: crate::arch::NodeId) -> TaskGraph {
        let mut graph = TaskGraph::new();
        let src = graph
            .add_task("src", Box::new(MemorySource::new(input)), TaskConfig::new())
            .unwrap();
        let scale = graph
            .add_task("scale", Box::new(Scale::default()), TaskConfig::new().with("factor", 3.0))
            .unwrap();
        let dst = graph
            .add_task("sink", Box::new(sink.clone()), TaskConfig::new())
            .unwrap();
        graph.connect_nodes(src, scale).unwrap();
        graph.connect_nodes(scale, dst).unwrap();
        graph.pin(scale, remote).unwrap();
        graph
    }

    #[tokio::test]
    async fn bind_remote_adds_exported_nodes() {
        let (mut daemon, address) = started(2).await;

        let mut arch = ArchGraph::with_devices(&[DeviceKind::Cpu]);
        let ids = arch.bind_remote(&address).await.unwrap();

        assert_eq!(ids.len(), 3);
        let kinds: Vec<DeviceKind> = ids.iter().map(|&id| arch.node(id).unwrap().kind).collect();
        assert_eq!(kinds, vec![DeviceKind::Cpu, DeviceKind::Gpu, DeviceKind::Gpu]);
        assert!(ids.iter().all(|&id| arch.node(id).unwrap().is_remote()));
        assert_eq!(arch.remotes().len(), 1);
        // remote nodes never become the default placement
        assert_eq!(arch.default_node().map(|n| n.id), Some(crate::arch::NodeId(0)));

        daemon.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn remote_task_processes_a_stream_in_order() {
        let (mut daemon, address) = started(1).await;
        let mut arch = ArchGraph::with_devices(&[DeviceKind::Cpu]);
        let ids = arch.bind_remote(&address).await.unwrap();

        let sink = MemorySink::new();
        let graph = scale_graph(frames(20), &sink, ids[1]);

        let report = FixedScheduler::default()
            .run(graph, &arch)
            .await
            .unwrap()
            .join()
            .await
            .unwrap();

        assert_eq!(report.processed("scale"), 20);
        let collected = sink.contents().take();
        assert_eq!(collected.len(), 20);
        for (i, buffer) in collected.iter().enumerate() {
            assert_eq!(buffer.shape().dims(), &[2, 2]);
            assert_eq!(buffer.as_slice::<f32>().unwrap(), &[3.0 * i as f32; 4]);
        }

        daemon.stop().await;
    }

    #[tokio::test]
    async fn remote_processing_error_fails_the_run() {
        let (mut daemon, address) = started(0).await;
        let mut arch = ArchGraph::with_devices(&[DeviceKind::Cpu]);
        let ids = arch.bind_remote(&address).await.unwrap();

        let sink = MemorySink::new();
        let input = vec![Buffer::from_vec([2], vec![1u16, 2]).unwrap()];
        let graph = scale_graph(input, &sink, ids[0]);

        let err = FixedScheduler::new(SchedulerOptions::default())
            .run(graph, &arch)
            .await
            .unwrap()
            .join()
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::RemoteFailed { ref task, .. } if task == "scale"), "{err}");
        assert!(sink.contents().is_empty());

        daemon.stop().await;
    }

    #[tokio::test]
    async fn stop_releases_the_port() {
        let (mut daemon, _) = started(0).await;
        let address = daemon.local_addr().unwrap();

        daemon.stop().await;
        assert!(daemon.local_addr().is_none());

        let rebound = tokio::net::TcpListener::bind(address).await;
        assert!(rebound.is_ok(), "port still held: {:?}", rebound.err());
    }

    #[tokio::test]
    async fn stop_aborts_sessions_that_outlive_the_grace_period() {
        let (mut daemon, address) = started(0).await;
        let mut arch = ArchGraph::with_devices(&[DeviceKind::Cpu]);
        let ids = arch.bind_remote(&address).await.unwrap();

        // an endless source keeps the remote session busy past the grace period
        let mut graph = TaskGraph::new();
        let src = graph
            .add_task(
                "src",
                Box::new(Generate::default()),
                TaskConfig::new()
                    .with("number", i64::MAX)
                    .with("width", 2i64)
                    .with("height", 2i64),
            )
            .unwrap();
        let scale = graph
            .add_task("scale", Box::new(Scale::default()), TaskConfig::new().with("factor", 1.0))
            .unwrap();
        let dst = graph
            .add_task("sink", Box::new(NullSink::new()), TaskConfig::new())
            .unwrap();
        graph.connect_nodes(src, scale).unwrap();
        graph.connect_nodes(scale, dst).unwrap();
        graph.pin(scale, ids[0]).unwrap();

        let handle = FixedScheduler::default().run(graph, &arch).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), daemon.stop())
            .await
            .expect("stop returns after the grace period");

        let err = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("run ends once the daemon is gone")
            .unwrap_err();
        assert!(
            matches!(
                err,
                ExecutionError::RemoteFailed { .. } | ExecutionError::Connection(_) | ExecutionError::TaskFailed { .. }
            ),
            "{err}"
        );
    }

    #[tokio::test]
    async fn unknown_task_type_is_rejected() {
        let (mut daemon, address) = started(0).await;

        let session = Session::open(&address, RetryPolicy::default()).await.unwrap();
        let err = session
            .submit(Submit {
                task_type: "median".into(),
                task_name: "blur".into(),
                options: vec![],
                node_index: 0,
                replica: 0,
                replicas: 1,
            })
            .await
            .unwrap_err();
        match err {
            ConnectionError::Rejected { reason, .. } => assert!(reason.contains("UnknownTaskType"), "{reason}"),
            other => panic!("expected rejection, got {other}"),
        }

        daemon.stop().await;
    }

    #[tokio::test]
    async fn invalid_node_index_is_rejected() {
        let (mut daemon, address) = started(0).await;

        let session = Session::open(&address, RetryPolicy::default()).await.unwrap();
        let err = session
            .submit(Submit {
                task_type: "scale".into(),
                task_name: "scale".into(),
                options: codec::options_to_wire(&TaskConfig::new().with("factor", 2.0)),
                node_index: 7,
                replica: 0,
                replicas: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Rejected { ref reason, .. } if reason.contains("InvalidNode")));

        daemon.stop().await;
    }

    #[tokio::test]
    async fn mismatched_protocol_version_is_rejected() {
        let (mut daemon, _) = started(0).await;
        let address = daemon.local_addr().unwrap();

        let stream = tokio::net::TcpStream::connect(address).await.unwrap();
        let mut transport = codec::framed(stream);
        codec::send(&mut transport, Body::Hello(Hello { protocol_version: 99 }))
            .await
            .unwrap();

        match codec::recv(&mut transport).await.unwrap() {
            Some(Body::Reject(reject)) => {
                assert!(matches!(RejectReason::try_from(reject.reason), Ok(RejectReason::VersionMismatch)));
            }
            other => panic!("expected Reject, got {other:?}"),
        }

        daemon.stop().await;
    }

    #[tokio::test]
    async fn malformed_data_is_answered_with_a_protocol_failure() {
        let (mut daemon, address) = started(0).await;

        let session = Session::open(&address, RetryPolicy::default()).await.unwrap();
        let (_, mut transport) = session
            .submit(Submit {
                task_type: "scale".into(),
                task_name: "scale".into(),
                options: codec::options_to_wire(&TaskConfig::new().with("factor", 2.0)),
                node_index: 0,
                replica: 0,
                replicas: 1,
            })
            .await
            .unwrap();

        let data = Data {
            port: 0,
            edge_id: 0,
            dtype: DTypeCode::F32 as i32,
            shape: vec![1 << 33, 1 << 33, 1 << 33],
            payload: vec![0; 4],
        };
        codec::send(&mut transport, Body::Data(data)).await.unwrap();

        match codec::recv(&mut transport).await.unwrap() {
            Some(Body::Failure(failure)) => {
                assert!(matches!(FailureKind::try_from(failure.kind), Ok(FailureKind::Protocol)));
                assert!(failure.message.contains("invalid buffer"), "{}", failure.message);
            }
            other => panic!("expected Failure, got {other:?}"),
        }

        daemon.stop().await;
    }

    #[tokio::test]
    async fn input_port_is_bound_to_the_edge_that_first_fed_it() {
        let (mut daemon, address) = started(0).await;

        let session = Session::open(&address, RetryPolicy::default()).await.unwrap();
        let (_, mut transport) = session
            .submit(Submit {
                task_type: "scale".into(),
                task_name: "scale".into(),
                options: codec::options_to_wire(&TaskConfig::new().with("factor", 2.0)),
                node_index: 0,
                replica: 0,
                replicas: 1,
            })
            .await
            .unwrap();

        let frame = Buffer::from_vec([2, 2], vec![1.0f32; 4]).unwrap();
        codec::send(&mut transport, Body::Data(codec::encode_buffer(0, EdgeId(3), &frame)))
            .await
            .unwrap();
        match codec::recv(&mut transport).await.unwrap() {
            Some(Body::Data(data)) => assert_eq!(data.edge_id, 0),
            other => panic!("expected Data, got {other:?}"),
        }

        codec::send(&mut transport, Body::Data(codec::encode_buffer(0, EdgeId(5), &frame)))
            .await
            .unwrap();
        match codec::recv(&mut transport).await.unwrap() {
            Some(Body::Failure(failure)) => {
                assert!(matches!(FailureKind::try_from(failure.kind), Ok(FailureKind::Protocol)));
                assert!(failure.message.contains("switched from edge 3 to edge 5"), "{}", failure.message);
            }
            other => panic!("expected Failure, got {other:?}"),
        }

        daemon.stop().await;
    }
}
