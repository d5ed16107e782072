use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Workspace crates whose events are captured at every level.
const WORKSPACE_CRATES: &[&str] = &["s3perf", "s3perf_backend", "s3perf_bench"];

/// Routes benchmark logs into the output of the running test.
///
/// Events of the workspace crates are kept down to `TRACE`, dependencies only report errors.
/// Output goes through the test writer, so it is only shown for failing tests or with
/// `--nocapture`. Calling this more than once is harmless.
///
/// ```
/// s3perf_test::tracing::init();
/// ```
pub fn init() {
    let env_filter = WORKSPACE_CRATES
        .iter()
        .filter_map(|name| format!("{name}=trace").parse::<Directive>().ok())
        .fold(EnvFilter::new("error"), EnvFilter::add_directive);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .compact()
        .try_init();
}
