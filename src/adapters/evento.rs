use crate::config::toml_config::SourceConfig;
use crate::domain::model::Scope;
use crate::domain::ports::SourceClient;
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Evento 的 JSON 匯出端點
pub struct EventoClient {
    client: Client,
    endpoint: String,
    page_id: String,
    namespace: String,
}

impl EventoClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
            page_id: config.page_id.clone(),
            namespace: config.namespace.clone(),
        })
    }

    fn query(&self, scope: &Scope) -> Vec<(String, String)> {
        let mut params = vec![("id".to_string(), self.page_id.clone())];

        let (id, get) = match scope {
            Scope::Programs => return params,
            Scope::ModulesOf(id) => (id, "module"),
            // the export really calls it "modul"
            Scope::MembersOf(id) => (id, "modul"),
        };

        if !id.is_empty() {
            params.push((format!("{}[id]", self.namespace), id.clone()));
        }
        params.push((format!("{}[get]", self.namespace), get.to_string()));
        params
    }
}

#[async_trait]
impl SourceClient for EventoClient {
    async fn fetch(&self, scope: &Scope) -> Result<Vec<serde_json::Value>> {
        tracing::debug!("📡 Fetching {} from {}", scope, self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query(scope))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::SourceError {
                scope: scope.to_string(),
                message: format!("HTTP status {}", response.status()),
            });
        }

        let body = response.text().await?;
        decode_records(scope, &body)
    }
}

pub fn decode_records(scope: &Scope, body: &str) -> Result<Vec<serde_json::Value>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| SyncError::SourceError {
            scope: scope.to_string(),
            message: format!("undecodable payload: {}", e),
        })?;

    match json {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Null => Ok(Vec::new()),
        // 物件形式的清單：依來源文件順序取出 (preserve_order)
        serde_json::Value::Object(map) => Ok(map.into_iter().map(|(_, v)| v).collect()),
        other => Err(SyncError::SourceError {
            scope: scope.to_string(),
            message: format!("expected a list, got {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> EventoClient {
        EventoClient::new(&SourceConfig {
            endpoint: "http://localhost/index.php".to_string(),
            page_id: "moodle".to_string(),
            namespace: "tx_htwmoodledata_pi1".to_string(),
            timeout_seconds: Some(5),
        })
        .unwrap()
    }

    #[test]
    fn test_program_query_has_only_page_id() {
        let params = client().query(&Scope::Programs);
        assert_eq!(params, vec![("id".to_string(), "moodle".to_string())]);
    }

    #[test]
    fn test_member_query_uses_modul() {
        let params = client().query(&Scope::MembersOf("42".to_string()));
        assert_eq!(params.len(), 3);
        assert_eq!(params[1], ("tx_htwmoodledata_pi1[id]".to_string(), "42".to_string()));
        assert_eq!(params[2], ("tx_htwmoodledata_pi1[get]".to_string(), "modul".to_string()));
    }

    #[test]
    fn test_decode_empty_and_null() {
        assert!(decode_records(&Scope::Programs, "").unwrap().is_empty());
        assert!(decode_records(&Scope::Programs, "null").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_records(&Scope::Programs, "<html>"),
            Err(SyncError::SourceError { .. })
        ));
        assert!(decode_records(&Scope::Programs, "42").is_err());
    }

    #[test]
    fn test_decode_object_keeps_source_order() {
        let body = r#"{
            "2": {"nummer": "P2"},
            "10": {"nummer": "P10"},
            "b": {"nummer": "Pb"},
            "a": {"nummer": "Pa"}
        }"#;
        let codes: Vec<String> = decode_records(&Scope::Programs, body)
            .unwrap()
            .iter()
            .map(|r| r["nummer"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(codes, vec!["P2", "P10", "Pb", "Pa"]);
    }
}
