//! LDAP directory client over `ldap3`.

use super::{
    DirectoryConnection, DirectoryConnector, DirectoryEntry, DirectoryError, SearchRequest,
    RESULT_INVALID_CREDENTIALS,
};
use async_trait::async_trait;
use ldap3::{
    DerefAliases, Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry,
    SearchOptions,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Opens connections to the configured LDAP server.
///
/// `ldap://` and `ldaps://` URLs are both accepted; the latter uses rustls.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    url: String,
    timeout: Duration,
}

impl LdapConnector {
    /// `timeout` bounds connection establishment and every operation.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, DirectoryError> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.timeout);
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(target: "ldap_auth.directory", error = %e, "LDAP connection terminated");
            }
        });

        debug!(target: "ldap_auth.directory", url = %self.url, "LDAP connection established");

        Ok(Box::new(LdapConnection {
            ldap,
            timeout: self.timeout,
        }))
    }
}

struct LdapConnection {
    ldap: Ldap,
    timeout: Duration,
}

#[async_trait]
impl DirectoryConnection for LdapConnection {
    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let filter = request.filter();
        let (entries, _) = self
            .ldap
            .with_timeout(self.timeout)
            .with_search_options(SearchOptions::new().deref(DerefAliases::Never))
            .search(
                &request.base,
                Scope::Subtree,
                &filter,
                request.attributes.clone(),
            )
            .await
            .and_then(ldap3::SearchResult::success)
            .map_err(classify)?;

        Ok(entries
            .into_iter()
            .map(|entry| into_directory_entry(SearchEntry::construct(entry)))
            .collect())
    }

    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        self.ldap
            .with_timeout(self.timeout)
            .simple_bind(dn, password)
            .await
            .and_then(ldap3::LdapResult::success)
            .map(|_| ())
            .map_err(classify)
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!(target: "ldap_auth.directory", error = %e, "unbind failed");
        }
    }
}

/// Text attributes win; binary values that happen to be UTF-8 are merged in.
fn into_directory_entry(entry: SearchEntry) -> DirectoryEntry {
    let mut attributes = entry.attrs;
    for (name, values) in entry.bin_attrs {
        let decoded = values
            .into_iter()
            .filter_map(|value| String::from_utf8(value).ok());
        attributes.entry(name).or_default().extend(decoded);
    }

    DirectoryEntry {
        dn: entry.dn,
        attributes,
    }
}

fn classify(error: LdapError) -> DirectoryError {
    match error {
        LdapError::LdapResult { result } if result.rc == RESULT_INVALID_CREDENTIALS => {
            DirectoryError::InvalidCredentials
        }
        LdapError::LdapResult { result } => DirectoryError::Protocol {
            code: result.rc,
            message: result.text,
        },
        LdapError::Io { .. }
        | LdapError::OpSend { .. }
        | LdapError::ResultRecv { .. }
        | LdapError::Timeout { .. }
        | LdapError::EndOfStream => DirectoryError::Network(error.to_string()),
        other => DirectoryError::Protocol {
            code: 0,
            message: other.to_string(),
        },
    }
}
