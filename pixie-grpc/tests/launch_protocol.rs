//! Exercises the full launch protocol against a real plugin binary.
//! Requires `PIXIE_TEST_PLUGIN_BIN` to point at an executable that, given
//! `--port=0`, binds a port, prints `PORT=<n>`, and serves the plugin gRPC
//! service plus the standard health check. No such fixture ships in this
//! repo, so the test is ignored by default.

use std::path::PathBuf;

use pixie_grpc::launch::launch_plugin;

#[tokio::test]
#[ignore]
async fn launches_dials_and_health_checks_a_real_plugin() {
    let bin = std::env::var("PIXIE_TEST_PLUGIN_BIN").expect("PIXIE_TEST_PLUGIN_BIN must be set");
    let launched = launch_plugin(&PathBuf::from(bin)).await.expect("plugin should launch");
    assert!(launched.endpoint.starts_with("http://localhost:"));
}
