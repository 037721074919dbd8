//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 线格式合约测试
//! - 配置文件 → sink manager → sink 输出的端到端流程

#[cfg(test)]
mod contract_tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};
    use contracts::{ControlMethod, FieldValue, Message, Variant};

    #[test]
    fn test_canonical_line_encoding() {
        let msg = Message::new_metric(
            "cpu_load",
            [("host", "n1")],
            [("unit", "%")],
            0.75,
            Utc.timestamp_nanos(1_700_000_000_000_000_000),
        )
        .unwrap();

        assert_eq!(
            msg.encode_line(&BTreeSet::new()).unwrap(),
            "cpu_load,host=n1 value=0.75 1700000000000000000"
        );
        let promote: BTreeSet<String> = ["unit".to_string()].into();
        assert_eq!(
            msg.encode_line(&promote).unwrap(),
            "cpu_load,host=n1,unit=% value=0.75 1700000000000000000"
        );
    }

    #[test]
    fn test_line_and_json_forms_agree() {
        let input = b"disk\\ io,dev=sda1 reads=12i,busy=t,state=\"ok\" 1700000000000000042\n";
        let from_line = Message::decode_all(input).unwrap().remove(0);
        assert_eq!(from_line.name(), "disk io");
        assert_eq!(from_line.get_field("busy"), Some(&FieldValue::Bool(true)));

        let json = from_line.to_json(&BTreeSet::new()).unwrap();
        let from_json = Message::from_json(&json).unwrap();
        assert_eq!(from_json.tags(), from_line.tags());
        assert_eq!(from_json.fields(), from_line.fields());
        assert_eq!(from_json.time(), from_line.time());
        assert_eq!(from_json.variant(), Variant::Invalid);
    }

    #[test]
    fn test_variant_classification() {
        let lines = b"temp,host=a value=21.5 1\n\
                      job,host=a event=\"started\" 2\n\
                      app,host=a log=\"disk full\" 3\n\
                      knob,method=PUT control=\"on\" 4\n\
                      knob,method=GET control=\"\" 5\n";
        let messages = Message::decode_all(lines).unwrap();
        let variants: Vec<Variant> = messages.iter().map(Message::variant).collect();
        assert_eq!(
            variants,
            vec![
                Variant::Metric,
                Variant::Event,
                Variant::Log,
                Variant::Control,
                Variant::Control,
            ]
        );
        assert_eq!(messages[3].control_method(), Some(ControlMethod::Put));
        assert_eq!(messages[3].control_value(), Some("on"));
        assert_eq!(messages[4].control_method(), Some(ControlMethod::Get));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use config_loader::ConfigLoader;
    use contracts::{BoxedSink, ContractError, Message, Sink};
    use dispatcher::{SinkManager, SinkRegistry};
    use serde_json::json;
    use tempfile::tempdir;
    use tokio::net::UdpSocket;
    use tokio::sync::mpsc;

    fn metric(seq: i64) -> Message {
        Message::new_metric(
            "requests",
            [("host", "n1")],
            [("unit", "1/s")],
            seq,
            Utc.timestamp_nanos(1_700_000_000_000_000_000 + seq),
        )
        .unwrap()
    }

    /// Counts writes and closes; optionally fails every write
    struct CountingSink {
        name: String,
        fail: bool,
        writes: Arc<AtomicU64>,
        closes: Arc<AtomicU64>,
    }

    impl Sink for CountingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _msg: &Message) -> Result<(), ContractError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ContractError::sink_write(&self.name, "refused"));
            }
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// 端到端：带 sinks 引用的配置文件 -> SinkManager -> file sinks
    #[tokio::test]
    async fn test_e2e_config_to_file_sinks() {
        let dir = tempdir().unwrap();
        let lines_out = dir.path().join("out/metrics.lp");
        let json_out = dir.path().join("out/metrics.jsonl");

        std::fs::write(
            dir.path().join("sinks.json"),
            json!({
                "lines": {"type": "file", "path": lines_out, "append": false},
                "json": {
                    "type": "file",
                    "path": json_out,
                    "format": "json",
                    "meta_as_tags": ["unit"]
                }
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("relay.toml"),
            "sinks-file = \"sinks.json\"\n\n[relay]\nqueue_capacity = 8\nmax_forward = 4\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&dir.path().join("relay.toml")).unwrap();
        let settings = config.relay_settings().unwrap();
        let mut manager =
            SinkManager::from_config(SinkRegistry::with_builtin(), config.sinks().unwrap())
                .await
                .unwrap()
                .with_max_forward(settings.max_forward);
        assert_eq!(manager.sink_names().await, vec!["json", "lines"]);

        let (tx, rx) = mpsc::channel(settings.queue_capacity);
        manager.add_input(rx);
        manager.start();

        for seq in 0..20 {
            tx.send(metric(seq)).await.unwrap();
        }
        drop(tx);
        manager.drain_and_close().await;

        let written = std::fs::read_to_string(&lines_out).unwrap();
        let decoded = Message::decode_all(written.as_bytes()).unwrap();
        assert_eq!(decoded.len(), 20);
        assert_eq!(decoded[7].metric_value().and_then(|v| v.as_i64()), Some(7));
        assert!(!written.contains("unit="));

        let json_lines = std::fs::read_to_string(&json_out).unwrap();
        assert_eq!(json_lines.lines().count(), 20);
        let first: serde_json::Value =
            serde_json::from_str(json_lines.lines().next().unwrap()).unwrap();
        assert_eq!(first["tags"]["unit"], "1/s");
        assert_eq!(first["fields"]["value"], 0);
    }

    /// 自定义后端失败不影响其他 sink 投递
    #[tokio::test]
    async fn test_e2e_failing_sink_isolated() {
        let writes = Arc::new(AtomicU64::new(0));
        let closes = Arc::new(AtomicU64::new(0));

        let mut registry = SinkRegistry::with_builtin();
        let (w, c) = (Arc::clone(&writes), Arc::clone(&closes));
        registry.register("counting", move |name, config| {
            let sink = CountingSink {
                name,
                fail: config.get("fail").and_then(|v| v.as_bool()).unwrap_or(false),
                writes: Arc::clone(&w),
                closes: Arc::clone(&c),
            };
            async move { Ok::<_, ContractError>(Box::new(sink) as BoxedSink) }
        });

        let dir = tempdir().unwrap();
        let out = dir.path().join("ok.lp");
        let sinks = json!({
            "good": {"type": "counting"},
            "bad": {"type": "counting", "fail": true},
            "disk": {"type": "file", "path": out},
            "nowhere": {"type": "carrier-pigeon"}
        });
        let mut manager = SinkManager::from_config(registry, &sinks).await.unwrap();
        assert_eq!(manager.sink_names().await.len(), 3);

        let (tx, rx) = mpsc::channel(16);
        manager.add_input(rx);
        manager.start();
        for seq in 0..50 {
            tx.send(metric(seq)).await.unwrap();
        }
        drop(tx);

        let handles = manager.metric_handles().await;
        manager.drain_and_close().await;

        assert_eq!(writes.load(Ordering::SeqCst), 100);
        assert_eq!(closes.load(Ordering::SeqCst), 2);
        for (name, _sink_type, metrics) in &handles {
            let snapshot = metrics.snapshot();
            assert_eq!(snapshot.attempts(), 50, "sink {name}");
            let expected_failures = if name == "bad" { 50 } else { 0 };
            assert_eq!(snapshot.failure_count, expected_failures, "sink {name}");
        }
        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written.lines().count(), 50);
    }

    /// 消息以 line protocol 数据报送达 UDP 收集端
    #[tokio::test]
    async fn test_e2e_udp_collector() {
        let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = collector.local_addr().unwrap().to_string();

        let mut manager = SinkManager::from_config(
            SinkRegistry::with_builtin(),
            &json!({"net": {"type": "udp", "addr": addr}}),
        )
        .await
        .unwrap();
        let (tx, rx) = mpsc::channel(4);
        manager.add_input(rx);
        manager.start();

        for seq in 0..3 {
            tx.send(metric(seq)).await.unwrap();
        }

        let mut buf = vec![0u8; 2048];
        let mut received = Vec::new();
        for _ in 0..3 {
            let len = tokio::time::timeout(
                std::time::Duration::from_secs(5),
                collector.recv(&mut buf),
            )
            .await
            .unwrap()
            .unwrap();
            received.extend(Message::decode_all(&buf[..len]).unwrap());
        }
        manager.close().await;

        let values: Vec<i64> = received
            .iter()
            .filter_map(|m| m.metric_value().and_then(|v| v.as_i64()))
            .collect();
        assert_eq!(values, vec![0, 1, 2]);
    }
}
