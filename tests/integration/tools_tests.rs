//! Tool behaviour through the registry, against a scripted server.

use crate::common::initialized_pair;
use lsp_bridge::config::BridgeConfig;
use lsp_bridge::lsp::uri::path_to_uri;
use lsp_bridge::tools::{ToolContext, ToolRegistry};
use serde_json::json;

#[tokio::test]
async fn definition_via_registry_renders_expanded_block() {
    let workspace = tempfile::tempdir().unwrap();
    let root = workspace.path().canonicalize().unwrap();
    let (client, mut server) = initialized_pair(&root).await;

    let file = root.join("service.ts");
    tokio::fs::write(
        &file,
        "// Creates the widget\n// used by the factory\nfunction makeWidget() {\n  return {};\n}\nconst other = 1;\n",
    )
    .await
    .unwrap();
    let uri = path_to_uri(&file).unwrap();

    let ctx = ToolContext {
        client: client.clone(),
        workspace_root: root,
        config: BridgeConfig::default(),
    };
    let registry = ToolRegistry::with_default_tools();

    let responder = tokio::spawn(async move {
        let request = server.recv_method("workspace/symbol").await;
        assert_eq!(request["params"]["query"], "makeWidget");
        server
            .respond(
                &request["id"].clone(),
                json!([{
                    "name": "makeWidget",
                    "kind": 12,
                    "location": {"uri": uri, "range": {
                        "start": {"line": 2, "character": 9},
                        "end": {"line": 2, "character": 19},
                    }},
                }]),
            )
            .await;
        server.recv_method("textDocument/didOpen").await;
    });

    let output = registry
        .get_tool("definition")
        .unwrap()
        .execute(json!({"symbolName": "makeWidget"}), &ctx)
        .await
        .unwrap();
    responder.await.unwrap();

    // Both leading comment lines and the closing brace are included;
    // the unrelated trailing line is not.
    assert!(output.contains("Symbol: makeWidget"));
    assert!(output.contains("     1| // Creates the widget"));
    assert!(output.contains("     3| function makeWidget() {"));
    assert!(output.contains("     5| }"));
    assert!(!output.contains("const other"));
}

#[tokio::test]
async fn rename_via_registry_writes_both_files() {
    let workspace = tempfile::tempdir().unwrap();
    let root = workspace.path().canonicalize().unwrap();
    let (client, mut server) = initialized_pair(&root).await;

    let lib_file = root.join("lib.rs");
    let use_file = root.join("use.rs");
    tokio::fs::write(&lib_file, "pub fn old_name() {}\nold_name();\nold_name();\n")
        .await
        .unwrap();
    tokio::fs::write(&use_file, "crate::old_name();\n").await.unwrap();
    let lib_uri = path_to_uri(&lib_file).unwrap();
    let use_uri = path_to_uri(&use_file).unwrap();

    let ctx = ToolContext {
        client,
        workspace_root: root,
        config: BridgeConfig::default(),
    };
    let registry = ToolRegistry::with_default_tools();

    let responder = tokio::spawn(async move {
        let request = server.recv_method("textDocument/rename").await;
        let edit = |line: u32, start: u32, end: u32| {
            json!({"range": {
                "start": {"line": line, "character": start},
                "end": {"line": line, "character": end},
            }, "newText": "new_name"})
        };
        server
            .respond(
                &request["id"].clone(),
                json!({"changes": {
                    lib_uri: [edit(0, 7, 15), edit(1, 0, 8), edit(2, 0, 8)],
                    use_uri: [edit(0, 7, 15)],
                }}),
            )
            .await;
    });

    let output = registry
        .get_tool("rename_symbol")
        .unwrap()
        .execute(
            json!({"filePath": "lib.rs", "line": 1, "column": 8, "newName": "new_name"}),
            &ctx,
        )
        .await
        .unwrap();
    responder.await.unwrap();

    assert!(output.starts_with("Total changes: 4 across 2 file(s)"));
    assert_eq!(
        tokio::fs::read_to_string(&lib_file).await.unwrap(),
        "pub fn new_name() {}\nnew_name();\nnew_name();\n"
    );
    assert_eq!(
        tokio::fs::read_to_string(&use_file).await.unwrap(),
        "crate::new_name();\n"
    );
}

#[tokio::test]
async fn edit_file_via_registry_reports_line_delta() {
    use assert_fs::prelude::*;

    let workspace = assert_fs::TempDir::new().unwrap();
    workspace
        .child("notes.txt")
        .write_str("first\nsecond\nthird\n")
        .unwrap();
    let root = workspace.path().canonicalize().unwrap();
    let (client, _server) = initialized_pair(&root).await;
    let file = root.join("notes.txt");

    let ctx = ToolContext {
        client,
        workspace_root: root,
        config: BridgeConfig::default(),
    };
    let registry = ToolRegistry::with_default_tools();

    let output = registry
        .get_tool("edit_file")
        .unwrap()
        .execute(
            json!({"filePath": "notes.txt", "edits": [
                {"startLine": 2, "endLine": 2, "newText": "2nd\n2.5th"},
            ]}),
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(
        output,
        "Applied 1 edit(s) to notes.txt: 1 line(s) removed, 2 line(s) added"
    );
    assert_eq!(
        tokio::fs::read_to_string(&file).await.unwrap(),
        "first\n2nd\n2.5th\nthird\n"
    );
}

#[tokio::test]
async fn unknown_tool_is_absent_from_registry() {
    let registry = ToolRegistry::with_default_tools();
    assert!(registry.get_tool("grep").is_none());
    let names: Vec<&str> = registry.tools().map(|t| t.name()).collect();
    assert_eq!(
        names,
        vec![
            "definition",
            "references",
            "hover",
            "diagnostics",
            "rename_symbol",
            "edit_file"
        ]
    );
}
