#![allow(clippy::expect_used, clippy::unwrap_used)]

#[path = "../src/types/mod.rs"]
mod types;

#[test]
fn export_bindings() {
    let out_path = std::env::temp_dir().join("catalog_bindings.ts");
    let out_path_str = out_path.to_string_lossy().into_owned();
    let ts_cfg =
        specta::ts::ExportConfiguration::default().bigint(specta::ts::BigIntExportBehavior::Number);

    specta::export::ts_with_cfg(&out_path_str, &ts_cfg).expect("failed to export Specta bindings");

    let bindings = std::fs::read_to_string(&out_path).expect("read exported bindings");
    assert!(bindings.contains("WebhookEndpoint"));
    assert!(bindings.contains("TaskStatusResponse"));
}
