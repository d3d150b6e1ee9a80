//! NANDA agent-facts document describing this twin, served on `GET /agentfacts`.

use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::agent_twin::config::TwinConfig;
use crate::agent_twin::directory::A2A_SUFFIX;

/// Skills advertised by the twin: `(id, description)`.
pub const SKILLS: &[(&str, &str)] = &[
    ("question_answering", "Answer questions using memory and context"),
    ("a2a_routing", "Forward @mention-addressed messages to peer agents"),
    ("agent_search", "Find the best registered agent for a free-text query"),
];

/// `did:web` form of a provider URL.
fn provider_did(provider_url: &str) -> String {
    let host = provider_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("did:web:{}", host)
}

/// Build the facts document for `config`.
///
/// `agent_uuid` comes from the config when set; otherwise a fresh v4 UUID is drawn, so
/// callers that need a stable id across requests should resolve it once and keep it.
pub fn generate(config: &TwinConfig) -> Value {
    let agent_uuid = config
        .agent_uuid
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let base_url = config.base_url();
    let a2a_url = format!("{}{}", base_url, A2A_SUFFIX);
    let now = Utc::now();

    let skills: Vec<Value> = SKILLS
        .iter()
        .map(|(id, description)| {
            json!({
                "id": id,
                "description": description,
                "inputModes": ["text"],
                "outputModes": ["text"],
                "supportedLanguages": ["en"],
            })
        })
        .collect();

    json!({
        "id": format!("nanda:{}", agent_uuid),
        "agent_name": format!("urn:agent:nanda:{}", config.agent_username),
        "label": config.agent_name,
        "description": config.agent_description,
        "version": config.agent_version,
        "documentationUrl": format!("{}/docs", base_url),
        "jurisdiction": config.jurisdiction,
        "provider": {
            "name": config.provider_name,
            "url": config.provider_url,
            "did": provider_did(&config.provider_url),
        },
        "endpoints": {
            "static": [a2a_url],
            "adaptive_resolver": {
                "url": a2a_url,
                "policies": ["load"],
            },
        },
        "capabilities": {
            "modalities": ["text"],
            "streaming": false,
            "batch": false,
            "authentication": {
                "methods": ["none"],
                "requiredScopes": [],
            },
        },
        "skills": skills,
        "evaluations": {
            "lastAudited": now.to_rfc3339_opts(SecondsFormat::Secs, true),
            "auditTrail": null,
            "auditorID": "Self-Reported",
        },
        "certification": {
            "level": "self-declared",
            "issuer": config.provider_name,
            "issuanceDate": now.to_rfc3339_opts(SecondsFormat::Secs, true),
            "expirationDate": (now + ChronoDuration::days(365))
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_twin::catalog::AgentCatalogEntry;

    fn config() -> TwinConfig {
        TwinConfig {
            agent_username: "mimo".into(),
            agent_name: "Mimo".into(),
            provider_url: "https://cats.example/".into(),
            agent_uuid: Some("1234".into()),
            public_url: Some("https://mimo.example".into()),
            ..TwinConfig::default()
        }
    }

    #[test]
    fn test_facts_identity_and_endpoints() {
        let facts = generate(&config());
        assert_eq!(facts["id"], "nanda:1234");
        assert_eq!(facts["agent_name"], "urn:agent:nanda:mimo");
        assert_eq!(facts["provider"]["did"], "did:web:cats.example");
        assert_eq!(facts["endpoints"]["static"][0], "https://mimo.example/a2a");
    }

    #[test]
    fn test_facts_are_readable_as_a_catalog_entry() {
        let entry: AgentCatalogEntry = serde_json::from_value(generate(&config())).unwrap();
        assert_eq!(entry.label, "Mimo");
        assert_eq!(entry.preferred_endpoint(), Some("https://mimo.example/a2a"));
        assert!(entry.skill_ids().contains(&"a2a_routing"));
    }

    #[test]
    fn test_missing_uuid_is_generated() {
        let facts = generate(&TwinConfig::default());
        let id = facts["id"].as_str().unwrap();
        let uuid = id.strip_prefix("nanda:").unwrap();
        assert!(uuid::Uuid::parse_str(uuid).is_ok());
    }
}
