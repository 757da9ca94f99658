//! Secret decoding helpers.
//!
//! The ScalewayCluster spec references a secret carrying the API credentials
//! (`accessKey`, `secretKey`, `projectID` and optionally `apiURL`), and each
//! ScalewayMachine references a secret carrying its raw bootstrap payload
//! under the `value` key.

use crate::error::ControllerError;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use scaleway_client::ScalewayClient;

const ACCESS_KEY: &str = "accessKey";
const SECRET_KEY: &str = "secretKey";
const PROJECT_ID: &str = "projectID";
const API_URL: &str = "apiURL";

const BOOTSTRAP_VALUE: &str = "value";

/// Decode one key of a secret as UTF-8.
fn string_value(secret: &Secret, key: &str) -> Result<String, ControllerError> {
    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or_else(|| ControllerError::MissingSecretKey {
            secret: secret.name_any(),
            key: key.to_string(),
        })?;
    String::from_utf8(bytes.0.clone()).map_err(|_| {
        ControllerError::InvalidConfig(format!(
            "secret {} key {} is not valid UTF-8",
            secret.name_any(),
            key
        ))
    })
}

/// Build a Scaleway client from a credentials secret.
pub fn scaleway_client_from_secret(secret: &Secret) -> Result<ScalewayClient, ControllerError> {
    let access_key = string_value(secret, ACCESS_KEY)?;
    let secret_key = string_value(secret, SECRET_KEY)?;
    let project_id = string_value(secret, PROJECT_ID)?;
    let api_url = string_value(secret, API_URL).ok();
    ScalewayClient::new(access_key, secret_key, project_id, api_url).map_err(Into::into)
}

/// Extract the raw bootstrap payload from a bootstrap secret.
pub fn bootstrap_payload(secret: &Secret) -> Result<String, ControllerError> {
    string_value(secret, BOOTSTRAP_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn secret(entries: &[(&str, &str)]) -> Secret {
        let data: BTreeMap<String, ByteString> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
            .collect();
        Secret {
            metadata: kube::api::ObjectMeta {
                name: Some("my-secret".to_string()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        }
    }

    #[test]
    fn client_from_complete_secret() {
        let secret = secret(&[
            ("accessKey", "SCWXXXXXXXXXXXXXXXXX"),
            ("secretKey", "00000000-0000-0000-0000-000000000000"),
            ("projectID", "11111111-1111-1111-1111-111111111111"),
        ]);
        assert!(scaleway_client_from_secret(&secret).is_ok());
    }

    #[test]
    fn client_from_incomplete_secret() {
        let secret = secret(&[("accessKey", "SCWXXXXXXXXXXXXXXXXX")]);
        let err = scaleway_client_from_secret(&secret).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::MissingSecretKey { ref key, .. } if key == "secretKey"
        ));
    }

    #[test]
    fn bootstrap_payload_value_key() {
        let secret = secret(&[("value", "#cloud-config\n")]);
        assert_eq!(bootstrap_payload(&secret).unwrap(), "#cloud-config\n");
    }
}
