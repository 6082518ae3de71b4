//! # OpenAPI YAML 生成ツール
//!
//! User Service の Rust 型から OpenAPI 仕様を YAML 形式で標準出力に出力する。
//!
//! ```bash
//! cargo run --bin generate-openapi -p warble-user-service > openapi/openapi.yaml
//! ```

use std::collections::HashSet;

use utoipa::OpenApi;
use warble_user_service::openapi::ApiDoc;

fn main() -> anyhow::Result<()> {
    let mut openapi = ApiDoc::openapi();
    remove_unused_schemas(&mut openapi)?;
    print!("{}", openapi.to_yaml()?);
    Ok(())
}

/// どこからも `$ref` されないコンポーネントスキーマを除去する
///
/// `body = ApiResponse<T>` は `T` を inline 展開するが、`T` 単体のスキーマも
/// 自動登録されて未使用のまま残る。
fn remove_unused_schemas(openapi: &mut utoipa::openapi::OpenApi) -> anyhow::Result<()> {
    let json = serde_json::to_string(openapi)?;

    let prefix = "#/components/schemas/";
    let used_schemas: HashSet<String> = json
        .match_indices(prefix)
        .filter_map(|(start, _)| {
            let rest = &json[start + prefix.len()..];
            rest.find('"').map(|end| rest[..end].to_string())
        })
        .collect();

    if let Some(components) = &mut openapi.components {
        components
            .schemas
            .retain(|name, _| used_schemas.contains(name.as_str()));
    }
    Ok(())
}
