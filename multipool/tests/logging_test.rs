use multipool::logging::{self, LogConfig};

// The global subscriber can only be installed once per process, so the whole
// sequence lives in one test.
#[test]
fn test_global_file_logging() {
    let dir = std::env::temp_dir();
    let missing = dir
        .join(format!("multipool-no-such-dir-{}", std::process::id()))
        .join("global.log");
    assert!(logging::init_with_file(LogConfig::default(), &missing.to_string_lossy()).is_err());
    assert!(!tracing::dispatcher::has_been_set());

    let path = dir.join(format!("multipool-global-{}.log", std::process::id()));
    let path_str = path.to_string_lossy().to_string();
    logging::init_with_file(LogConfig::default(), &path_str).unwrap();
    assert!(tracing::dispatcher::has_been_set());

    // Later initialisers are no-ops.
    logging::init_production();
    logging::init_default();

    tracing::info!(target: "multipool", "global sink ready");
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("global sink ready"));
    std::fs::remove_file(&path).unwrap();
}
