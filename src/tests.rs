#[cfg(test)]
mod integration_tests {
    use crate::{ArchiveError, CaptureFormat, CaptureTask, Config, TaskQueue, QUEUE_SNAPSHOT_FILE};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn task(url: &str) -> CaptureTask {
        CaptureTask {
            url: url.to_string(),
            title: url.to_string(),
            publish_time: "2024-01-01 00:00:00".to_string(),
            nickname: None,
            copyright_flag: 0,
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.headless);
        assert!(config.browser_path.is_none());
        assert_eq!(config.formats, CaptureFormat::all());
        assert_eq!(config.viewport.width, 1440);
        assert_eq!(config.viewport.height, 980);
        assert_eq!(config.navigation_timeout, Duration::from_secs(15));
        assert_eq!(config.stop_loading_timeout, Duration::from_secs(2));
        assert_eq!(config.task_pacing, Duration::from_secs(5));
    }

    #[test]
    fn test_config_validate_requires_save_path() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ArchiveError::ConfigurationError(_))
        ));

        let config = Config {
            save_path: "/srv/archive".into(),
            ..Default::default()
        };
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_queue_snapshot_path_under_run_dir() {
        let config = Config {
            save_path: "/srv/archive".into(),
            run_dir: "/var/lib/archiver".into(),
            ..Default::default()
        };
        assert_eq!(
            config.queue_snapshot_path(),
            std::path::PathBuf::from("/var/lib/archiver").join(QUEUE_SNAPSHOT_FILE)
        );
    }

    #[test]
    fn test_format_parse_list() {
        assert_eq!(
            CaptureFormat::parse_list("pdf,mhtml,html").unwrap(),
            CaptureFormat::all()
        );
        assert_eq!(
            CaptureFormat::parse_list("PDF, Mhtml").unwrap(),
            vec![CaptureFormat::Pdf, CaptureFormat::Mhtml]
        );
        // Duplicates collapse, order of first occurrence wins.
        assert_eq!(
            CaptureFormat::parse_list("html,pdf,html").unwrap(),
            vec![CaptureFormat::Html, CaptureFormat::Pdf]
        );
        tokio_test::assert_err!(CaptureFormat::parse_list("png"));
        tokio_test::assert_err!(CaptureFormat::parse_list(""));
    }

    #[test]
    fn test_task_json_defaults() {
        let json = r#"{
            "url": "https://example.com",
            "title": "Example",
            "publish_time": "2024-01-01 00:00:00"
        }"#;
        let task: CaptureTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.nickname, None);
        assert_eq!(task.copyright_flag, 0);
        assert_eq!(task.folder(), crate::DEFAULT_FOLDER);

        let task = CaptureTask {
            nickname: Some("alice".to_string()),
            ..task
        };
        assert_eq!(task.folder(), "alice");
    }

    #[test]
    fn test_error_relaunch_classification() {
        assert!(ArchiveError::SessionNotReady.requires_relaunch());
        assert!(ArchiveError::SessionDead("ws closed".to_string()).requires_relaunch());
        assert!(!ArchiveError::Unrecoverable("boom".to_string()).requires_relaunch());
        assert!(!ArchiveError::ConfigurationError("bad".to_string()).requires_relaunch());
        assert!(!ArchiveError::IoError("disk".to_string()).requires_relaunch());
    }

    #[test]
    fn test_browser_launch_args_hardening() {
        let config = Config::default();
        let args = crate::browser_launch_args(&config);

        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.contains(&"--disable-background-timer-throttling".to_string()));
        assert!(args.contains(&"--ignore-certificate-errors".to_string()));
        assert!(args.contains(&format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        )));
    }

    // Simulated restart: drain + snapshot at shutdown, restore at the next
    // startup, original order preserved and the file consumed.
    #[tokio::test]
    async fn test_queue_survives_restart_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join(QUEUE_SNAPSHOT_FILE);

        let queue = TaskQueue::new();
        queue.enqueue(task("https://a.example")).await;
        queue.enqueue(task("https://b.example")).await;
        queue.enqueue(task("https://c.example")).await;

        queue.close();
        let remaining = queue.drain_all().await;
        TaskQueue::snapshot(&remaining, &snapshot).await.unwrap();

        let next_run = TaskQueue::new();
        assert_eq!(next_run.restore(&snapshot).await, 3);
        assert!(!snapshot.exists());
        assert_eq!(next_run.dequeue().await.unwrap().url, "https://a.example");
        assert_eq!(next_run.dequeue().await.unwrap().url, "https://b.example");
        assert_eq!(next_run.dequeue().await.unwrap().url, "https://c.example");
    }

    #[tokio::test]
    async fn test_snapshot_is_human_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(QUEUE_SNAPSHOT_FILE);

        TaskQueue::snapshot(&[task("https://a.example")], &path)
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.starts_with('['));
        assert!(contents.contains("\"url\": \"https://a.example\""));
        assert!(contents.contains("\"publish_time\": \"2024-01-01 00:00:00\""));
    }
}
