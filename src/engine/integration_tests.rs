// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// End-to-end runs through both schedulers using real channels and contexts
#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::arch::{ArchGraph, DeviceKind, NodeId};
    use crate::backends::local::tasks::{MemorySink, MemorySource, NullSink, Slice, Stack};
    use crate::buffer::{Buffer, BufferPool};
    use crate::config::TaskConfig;
    use crate::engine::test_tasks::{Counter, Failing, Passthrough, Planned, Probe, Zip};
    use crate::engine::{AdaptiveScheduler, FixedScheduler, SchedulerOptions};
    use crate::errors::{ConfigurationError, ExecutionError, ProcessingError, TopologyError};
    use crate::graph::TaskGraph;
    use crate::traits::Scheduler;

    fn cpu() -> ArchGraph {
        ArchGraph::with_devices(&[DeviceKind::Cpu])
    }

    fn gpus(count: usize) -> ArchGraph {
        let mut kinds = vec![DeviceKind::Cpu];
        kinds.extend(std::iter::repeat(DeviceKind::Gpu).take(count));
        ArchGraph::with_devices(&kinds)
    }

    fn square(side: usize, seed: f32) -> Buffer {
        let values = (0..side * side).map(|i| seed + i as f32 * 0.25).collect();
        Buffer::from_vec(vec![side, side], values).unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_across_changing_shapes() {
        let frames = vec![square(256, 1.0), square(512, -3.5), square(1024, 0.5)];

        let forward = Planned::new(2.0);
        let inverse = Planned::new(0.5);
        let forward_rebuilds = forward.rebuilds();
        let inverse_rebuilds = inverse.rebuilds();
        let sink = MemorySink::new();
        let contents = sink.contents();

        let mut graph = TaskGraph::new();
        let source = graph
            .add_task("source", Box::new(MemorySource::new(frames.clone())), TaskConfig::new())
            .unwrap();
        let fwd = graph.add_task("forward", Box::new(forward), TaskConfig::new()).unwrap();
        let inv = graph.add_task("inverse", Box::new(inverse), TaskConfig::new()).unwrap();
        let out = graph.add_task("sink", Box::new(sink), TaskConfig::new()).unwrap();
        graph.connect_nodes(source, fwd).unwrap();
        graph.connect_nodes(fwd, inv).unwrap();
        graph.connect_nodes(inv, out).unwrap();

        let report = AdaptiveScheduler::default()
            .run(graph, &cpu())
            .await
            .unwrap()
            .join()
            .await
            .unwrap();

        let received = contents.take();
        assert_eq!(received.len(), frames.len());
        for (got, want) in received.iter().zip(&frames) {
            assert_eq!(got.shape(), want.shape());
            let got = got.as_slice::<f32>().unwrap();
            let want = want.as_slice::<f32>().unwrap();
            assert!(got.iter().zip(want).all(|(a, b)| (a - b).abs() <= 1e-6));
        }
        assert_eq!(forward_rebuilds.load(Ordering::SeqCst), 3);
        assert_eq!(inverse_rebuilds.load(Ordering::SeqCst), 3);
        assert_eq!(report.processed("forward"), 3);
    }

    #[tokio::test]
    async fn test_u16_sink_then_source_is_bit_exact() {
        let original: Vec<Buffer> = (0..4u16)
            .map(|frame| {
                let values = (0..64u16).map(|i| i.wrapping_mul(1021).wrapping_add(frame << 12)).collect();
                Buffer::from_vec(vec![8, 8], values).unwrap()
            })
            .collect();

        let mut stored = original.clone();
        for pass in 0..2 {
            let sink = MemorySink::new();
            let contents = sink.contents();
            let mut graph = TaskGraph::new();
            let source = graph
                .add_task("read", Box::new(MemorySource::new(stored)), TaskConfig::new())
                .unwrap();
            let write = graph.add_task("write", Box::new(sink), TaskConfig::new()).unwrap();
            graph.connect_nodes(source, write).unwrap();

            FixedScheduler::default().run(graph, &cpu()).await.unwrap().join().await.unwrap();
            stored = contents.take();
            assert_eq!(stored.len(), original.len(), "pass {pass}");
        }

        for (got, want) in stored.iter().zip(&original) {
            assert_eq!(got.as_slice::<u16>(), want.as_slice::<u16>());
            assert_eq!(got.storage().to_le_bytes(), want.storage().to_le_bytes());
        }
    }

    async fn stack_then_slice(frames: u32, group: i64) -> (usize, Vec<u32>) {
        let stacked = MemorySink::new();
        let stacked_contents = stacked.contents();
        let sink = MemorySink::new();
        let contents = sink.contents();

        let mut graph = TaskGraph::new();
        let source = graph.add_task("source", Box::new(Counter::source(frames)), TaskConfig::new()).unwrap();
        let stack = graph
            .add_task("stack", Box::new(Stack::default()), TaskConfig::new().with("number", group))
            .unwrap();
        let slice = graph.add_task("slice", Box::new(Slice::default()), TaskConfig::new()).unwrap();
        let groups = graph.add_task("groups", Box::new(stacked), TaskConfig::new()).unwrap();
        let out = graph.add_task("sink", Box::new(sink), TaskConfig::new()).unwrap();
        graph.connect_nodes(source, stack).unwrap();
        graph.connect_nodes(stack, slice).unwrap();
        graph.connect_nodes(stack, groups).unwrap();
        graph.connect_nodes(slice, out).unwrap();

        AdaptiveScheduler::default()
            .run(graph, &cpu())
            .await
            .unwrap()
            .join()
            .await
            .unwrap();

        let values = contents
            .take()
            .iter()
            .map(|b| {
                assert_eq!(b.shape().dims(), &[1]);
                b.as_slice::<u32>().unwrap()[0]
            })
            .collect();
        (stacked_contents.len(), values)
    }

    #[tokio::test]
    async fn test_stack_then_slice_restores_every_buffer() {
        let (groups, values) = stack_then_slice(10, 2).await;
        assert_eq!(groups, 5);
        assert_eq!(values, (0..10).collect::<Vec<_>>());

        let (groups, values) = stack_then_slice(10, 3).await;
        assert_eq!(groups, 4);
        assert_eq!(values, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_transitive_back_edge_fails_before_any_run() {
        let mut graph = TaskGraph::new();
        let a = graph.add_task("a", Box::new(Zip), TaskConfig::new()).unwrap();
        let b = graph.add_task("b", Box::new(Passthrough::default()), TaskConfig::new()).unwrap();
        let c = graph.add_task("c", Box::new(Passthrough::default()), TaskConfig::new()).unwrap();
        graph.connect_nodes(a, b).unwrap();
        graph.connect_nodes(b, c).unwrap();

        let err = graph.connect(c, 0, a, 1).unwrap_err();
        assert!(matches!(err, TopologyError::Cycle { .. }));

        // the rejected edge left the graph incomplete, so running it fails too
        let err = AdaptiveScheduler::default().run(graph, &cpu()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Topology(TopologyError::Incomplete { .. })));
    }

    #[tokio::test]
    async fn test_failing_task_aborts_run_and_tears_down_every_task() {
        let probes: Vec<Probe> = (0..4).map(|_| Probe::default()).collect();
        let mut graph = TaskGraph::new();
        let source = graph
            .add_task("source", Box::new(Counter::endless().with_probe(probes[0].clone())), TaskConfig::new())
            .unwrap();
        let broken = graph
            .add_task("broken", Box::new(Failing::after(3).with_probe(probes[1].clone())), TaskConfig::new())
            .unwrap();
        let after = graph
            .add_task("after", Box::new(Passthrough::default().with_probe(probes[2].clone())), TaskConfig::new())
            .unwrap();
        let sink = graph
            .add_task("sink", Box::new(Counter::sink().with_probe(probes[3].clone())), TaskConfig::new())
            .unwrap();
        graph.connect_nodes(source, broken).unwrap();
        graph.connect_nodes(broken, after).unwrap();
        graph.connect_nodes(after, sink).unwrap();

        let err = FixedScheduler::default()
            .run(graph, &cpu())
            .await
            .unwrap()
            .join()
            .await
            .unwrap_err();

        match err {
            ExecutionError::TaskFailed { task, replica, source } => {
                assert_eq!(task, "broken");
                assert_eq!(replica, 0);
                assert!(matches!(source, ProcessingError::Failed(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        for probe in &probes {
            assert_eq!(probe.setups(), 1);
            assert_eq!(probe.teardowns(), 1);
        }
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_seen_as_end_of_stream() {
        let sink = MemorySink::new();
        let contents = sink.contents();
        let mut graph = TaskGraph::new();
        let source = graph.add_task("source", Box::new(Counter::source(5)), TaskConfig::new()).unwrap();
        let broken = graph
            .add_task(
                "broken",
                Box::new(Failing::after(2).with_slow_teardown(Duration::from_millis(100))),
                TaskConfig::new(),
            )
            .unwrap();
        let stack = graph
            .add_task("stack", Box::new(Stack::default()), TaskConfig::new().with("number", 10i64))
            .unwrap();
        let out = graph.add_task("sink", Box::new(sink), TaskConfig::new()).unwrap();
        graph.connect_nodes(source, broken).unwrap();
        graph.connect_nodes(broken, stack).unwrap();
        graph.connect_nodes(stack, out).unwrap();

        let err = FixedScheduler::default()
            .run(graph, &cpu())
            .await
            .unwrap()
            .join()
            .await
            .unwrap_err();
        assert_eq!(err.task(), Some("broken"));
        // stack must not flush its partial group into the sink
        assert!(contents.is_empty());
    }

    #[tokio::test]
    async fn test_setup_failure_rolls_back_tasks_already_set_up() {
        let source_probe = Probe::default();
        let sink_probe = Probe::default();
        let mut graph = TaskGraph::new();
        let source = graph
            .add_task("source", Box::new(Counter::source(3).with_probe(source_probe.clone())), TaskConfig::new())
            .unwrap();
        let broken = graph.add_task("broken", Box::new(Failing::at_setup()), TaskConfig::new()).unwrap();
        let sink = graph
            .add_task("sink", Box::new(Counter::sink().with_probe(sink_probe.clone())), TaskConfig::new())
            .unwrap();
        graph.connect_nodes(source, broken).unwrap();
        graph.connect_nodes(broken, sink).unwrap();

        let err = AdaptiveScheduler::default().run(graph, &cpu()).await.err().unwrap();
        assert!(matches!(
            err,
            ExecutionError::Configuration(ConfigurationError::Setup { ref task, .. }) if task == "broken"
        ));
        assert_eq!((source_probe.setups(), source_probe.teardowns()), (1, 1));
        assert_eq!((sink_probe.setups(), sink_probe.teardowns()), (0, 0));
        assert_eq!(source_probe.processed(), 0);
    }

    #[tokio::test]
    async fn test_panicking_task_fails_the_run() {
        let mut graph = TaskGraph::new();
        let source = graph.add_task("source", Box::new(Counter::endless()), TaskConfig::new()).unwrap();
        let boom = graph.add_task("boom", Box::new(Failing::panicking()), TaskConfig::new()).unwrap();
        let sink = graph.add_task("sink", Box::new(Counter::sink()), TaskConfig::new()).unwrap();
        graph.connect_nodes(source, boom).unwrap();
        graph.connect_nodes(boom, sink).unwrap();

        let err = FixedScheduler::default()
            .run(graph, &cpu())
            .await
            .unwrap()
            .join()
            .await
            .unwrap_err();
        assert_eq!(err.task(), Some("boom"));
        assert!(err.to_string().contains("panicked"));
    }

    #[tokio::test]
    async fn test_external_cancel_aborts_every_context() {
        let probes: Vec<Probe> = (0..3).map(|_| Probe::default()).collect();
        let mut graph = TaskGraph::new();
        let source = graph
            .add_task("source", Box::new(Counter::endless().with_probe(probes[0].clone())), TaskConfig::new())
            .unwrap();
        let work = graph
            .add_task("work", Box::new(Passthrough::default().with_probe(probes[1].clone())), TaskConfig::new())
            .unwrap();
        let sink = graph
            .add_task("sink", Box::new(NullSink::default()), TaskConfig::new())
            .unwrap();
        graph.connect_nodes(source, work).unwrap();
        graph.connect_nodes(work, sink).unwrap();

        let handle = AdaptiveScheduler::default().run(graph, &cpu()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
        let err = handle.join().await.unwrap_err();

        assert!(matches!(err, ExecutionError::Cancelled));
        assert_eq!(probes[0].teardowns(), 1);
        assert_eq!(probes[1].teardowns(), 1);
        assert!(probes[1].processed() > 0);
    }

    async fn fan_out(scheduler: &dyn Scheduler, arch: &ArchGraph, replicas: usize) {
        let probe = Probe::default();
        let sink = Counter::sink();
        let collected = sink.collected();

        let mut graph = TaskGraph::new();
        let source = graph.add_task("source", Box::new(Counter::source(60)), TaskConfig::new()).unwrap();
        let work = graph
            .add_task("work", Box::new(Passthrough::default().with_probe(probe.clone())), TaskConfig::new())
            .unwrap();
        let out = graph.add_task("sink", Box::new(sink), TaskConfig::new()).unwrap();
        graph.connect_nodes(source, work).unwrap();
        graph.connect_nodes(work, out).unwrap();
        graph.expand(work, DeviceKind::Gpu).unwrap();

        let report = scheduler.run(graph, arch).await.unwrap().join().await.unwrap();

        let mut values: Vec<u32> = collected
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.as_slice::<u32>().unwrap()[0])
            .collect();
        values.sort_unstable();
        assert_eq!(values, (0..60).collect::<Vec<_>>());
        assert_eq!(probe.processed(), 60);
        assert_eq!(probe.setups(), replicas);
        assert_eq!(probe.teardowns(), replicas);
        assert_eq!(report.replicas("work"), replicas);
        assert_eq!(report.processed("work"), 60);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fan_out_processes_every_buffer_once_adaptive() {
        fan_out(&AdaptiveScheduler::default(), &gpus(3), 3).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fan_out_processes_every_buffer_once_fixed() {
        let mut scheduler = FixedScheduler::default();
        scheduler.set_gpu_nodes([NodeId(2), NodeId(4)]);
        fan_out(&scheduler, &gpus(4), 2).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_replicated_multi_input_task_keeps_tuples_aligned() {
        let sink = Counter::sink();
        let collected = sink.collected();
        let mut graph = TaskGraph::new();
        let left = graph.add_task("left", Box::new(Counter::source(40)), TaskConfig::new()).unwrap();
        let right = graph.add_task("right", Box::new(Counter::source(40)), TaskConfig::new()).unwrap();
        let zip = graph.add_task("zip", Box::new(Zip), TaskConfig::new()).unwrap();
        let out = graph.add_task("sink", Box::new(sink), TaskConfig::new()).unwrap();
        graph.connect(left, 0, zip, 0).unwrap();
        graph.connect(right, 0, zip, 1).unwrap();
        graph.connect_nodes(zip, out).unwrap();
        graph.expand(zip, DeviceKind::Gpu).unwrap();

        let report = AdaptiveScheduler::default()
            .run(graph, &gpus(2))
            .await
            .unwrap()
            .join()
            .await
            .unwrap();
        assert_eq!(report.replicas("zip"), 2);
        assert_eq!(collected.lock().unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_backpressure_bounds_pool_growth() {
        let pool = BufferPool::new();
        let scheduler = FixedScheduler::new(SchedulerOptions {
            queue_capacity: 2,
            ..SchedulerOptions::default()
        })
        .with_pool(pool.clone());

        let mut graph = TaskGraph::new();
        let source = graph.add_task("source", Box::new(Counter::source(200)), TaskConfig::new()).unwrap();
        let sink = graph.add_task("sink", Box::new(NullSink::default()), TaskConfig::new()).unwrap();
        graph.connect_nodes(source, sink).unwrap();

        let report = scheduler.run(graph, &cpu()).await.unwrap().join().await.unwrap();
        assert_eq!(report.processed("sink"), 200);

        let stats = pool.stats();
        assert!(stats.allocated <= 8, "allocated {} blocks", stats.allocated);
        assert_eq!(stats.allocated + stats.reused, 200);
    }

    #[tokio::test]
    async fn test_sink_emitting_data_fails() {
        #[derive(Clone)]
        struct Chatty;

        #[async_trait::async_trait]
        impl crate::traits::Task for Chatty {
            fn type_name(&self) -> &'static str {
                "chatty"
            }

            fn arity(&self) -> crate::traits::Arity {
                crate::traits::Arity::sink(1)
            }

            async fn process(
                &mut self,
                inputs: Vec<Buffer>,
                _ctx: &crate::traits::TaskContext<'_>,
            ) -> Result<crate::traits::Outcome, ProcessingError> {
                Ok(crate::traits::Outcome::Emit(inputs.into_iter().collect()))
            }
        }

        let mut graph = TaskGraph::new();
        let source = graph.add_task("source", Box::new(Counter::source(1)), TaskConfig::new()).unwrap();
        let sink = graph.add_task("chatty", Box::new(Chatty), TaskConfig::new()).unwrap();
        graph.connect_nodes(source, sink).unwrap();

        let err = FixedScheduler::default()
            .run(graph, &cpu())
            .await
            .unwrap()
            .join()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::TaskFailed { source: ProcessingError::InvalidOutputPort { port: 0, arity: 0 }, .. }
        ));
    }
}
