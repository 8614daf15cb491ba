//! Template context: the serializable payload `main.cf` is rendered from.

use serde::{Deserialize, Serialize};

use postsync_core::SyncSnapshot;

use crate::error::RenderError;

/// Everything `main.cf.tera` can reference, grouped by file section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainCfContext {
    pub identity: IdentityCtx,
    pub tls: TlsCtx,
    pub lookup: LookupCtx,
    pub limits: LimitsCtx,
    /// Milter address for the content-filter section; the section is left
    /// out when this is `None`.
    pub milter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCtx {
    pub hostname: String,
}

/// TLS is only switched on when both a certificate and a key are configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsCtx {
    pub enabled: bool,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

/// `type:path` pointers to the generated lookup maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupCtx {
    pub domains: String,
    pub aliases: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsCtx {
    pub message_size: u64,
    pub mailbox_size: u64,
    pub recipient_delimiter: String,
}

impl MainCfContext {
    /// Build the context for one sync run.
    pub fn from_snapshot(snapshot: &SyncSnapshot) -> Self {
        let settings = &snapshot.main_cf;
        let mode = snapshot.map_mode;
        let pointer = |file: &str| {
            format!(
                "{}:{}",
                mode.table_type(),
                snapshot.output_dir.join(file).display()
            )
        };

        let cert_file = settings
            .tls_cert_file
            .as_ref()
            .map(|p| p.display().to_string());
        let key_file = settings
            .tls_key_file
            .as_ref()
            .map(|p| p.display().to_string());

        MainCfContext {
            identity: IdentityCtx {
                hostname: snapshot.hostname.clone(),
            },
            tls: TlsCtx {
                enabled: cert_file.is_some() && key_file.is_some(),
                cert_file,
                key_file,
            },
            lookup: LookupCtx {
                domains: pointer(mode.domain_map_file()),
                aliases: pointer(mode.alias_map_file()),
            },
            limits: LimitsCtx {
                message_size: settings.message_size_limit,
                mailbox_size: settings.mailbox_size_limit,
                recipient_delimiter: "+".to_string(),
            },
            milter: settings
                .content_filter
                .clone()
                .filter(|f| !f.trim().is_empty()),
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}
