// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One remote catalog of installable modules.
//!
//! [`PluginRepository::reload`] never fails: the outcome is reported through
//! [`PluginRepository::state`]. The visible manifest list is swapped as a
//! whole, so a reader holding a snapshot always sees one complete list.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use hangar_config::ConfigHandle;
use hangar_core::{HangarError, RepositoryState};
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, HeaderValue};
use tracing::{debug, error, info, warn};

use crate::manifest::{ManifestValidity, RemoteManifest, RepoRef};

/// User agent sent with every catalog request.
pub const USER_AGENT: &str = concat!("hangar/", env!("CARGO_PKG_VERSION"));

/// Default bound on one catalog fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Build the HTTP client shared by all repositories.
pub fn build_client() -> Result<reqwest::Client, HangarError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    reqwest::Client::builder()
        .default_headers(headers)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| HangarError::Internal(format!("failed to build HTTP client: {e}")))
}

/// A remote catalog and its last fetched manifests.
pub struct PluginRepository {
    source: Arc<RepoRef>,
    is_enabled: bool,
    client: reqwest::Client,
    timeout: Duration,
    state: ArcSwap<RepositoryState>,
    manifests: ArcSwap<Vec<Arc<RemoteManifest>>>,
}

impl std::fmt::Debug for PluginRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRepository")
            .field("url", &self.source.url)
            .field("is_third_party", &self.source.is_third_party)
            .field("is_enabled", &self.is_enabled)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl PluginRepository {
    /// A repository at `url`. It is third-party unless `url` is `main_url`.
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        main_url: &str,
        is_enabled: bool,
    ) -> Self {
        let url = url.into();
        let is_third_party = url != main_url;
        Self {
            source: Arc::new(RepoRef {
                url,
                is_third_party,
            }),
            is_enabled,
            client,
            timeout: DEFAULT_FETCH_TIMEOUT,
            state: ArcSwap::from_pointee(RepositoryState::Idle),
            manifests: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// The main repository, after normalizing a known-bad configured URL.
    pub fn create_main(client: reqwest::Client, config: &ConfigHandle) -> Self {
        let url = config.normalize_main_repo_url();
        let timeout = config.load().repos.fetch_timeout();
        Self::new(client, url.clone(), &url, true).with_timeout(timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.source.url
    }

    pub fn is_third_party(&self) -> bool {
        self.source.is_third_party
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn state(&self) -> RepositoryState {
        **self.state.load()
    }

    /// Snapshot of the visible manifests, sorted by display name.
    pub fn manifests(&self) -> Arc<Vec<Arc<RemoteManifest>>> {
        self.manifests.load_full()
    }

    pub fn find(&self, internal_name: &str) -> Option<Arc<RemoteManifest>> {
        self.manifests
            .load()
            .iter()
            .find(|m| m.internal_name == internal_name)
            .cloned()
    }

    fn set_state(&self, state: RepositoryState) {
        self.state.store(Arc::new(state));
    }

    /// Fetch, validate and publish the catalog. The outcome is left in [`Self::state`].
    pub async fn reload(&self) {
        info!(url = %self.url(), "reloading repository");
        self.set_state(RepositoryState::InProgress);
        self.manifests.store(Arc::new(Vec::new()));

        match self.fetch().await {
            Ok(fetched) => {
                let visible = self.prepare(fetched);
                info!(url = %self.url(), count = visible.len(), "repository loaded");
                self.manifests.store(Arc::new(visible));
                self.set_state(RepositoryState::Success);
            }
            Err(e) => {
                error!(url = %self.url(), error = %e, "repository reload failed");
                self.set_state(RepositoryState::Fail);
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<RemoteManifest>, HangarError> {
        let fetch_error = |message: String, source: Option<hangar_core::BoxError>| {
            HangarError::RepositoryFetch {
                url: self.url().to_string(),
                message,
                source,
            }
        };

        let response = self
            .client
            .get(self.url())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fetch_error(format!("timed out after {:?}", self.timeout), Some(Box::new(e)))
                } else {
                    fetch_error(e.to_string(), Some(Box::new(e)))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("server returned {status}"), None));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(format!("failed to read body: {e}"), Some(Box::new(e))))?;

        let parsed: Option<Vec<RemoteManifest>> = serde_json::from_slice(&body)
            .map_err(|e| fetch_error(format!("malformed catalog: {e}"), Some(Box::new(e))))?;

        parsed.ok_or_else(|| {
            HangarError::Internal(format!("catalog at {} contained no manifest list", self.url()))
        })
    }

    /// Sort, stamp, validate and normalize a fetched batch.
    fn prepare(&self, mut fetched: Vec<RemoteManifest>) -> Vec<Arc<RemoteManifest>> {
        fetched.sort_by(|a, b| a.name.cmp(&b.name));

        fetched
            .into_iter()
            .filter_map(|mut manifest| {
                manifest.source_repo = Some(Arc::clone(&self.source));
                match manifest.validity() {
                    ManifestValidity::Valid => {}
                    ManifestValidity::Suspicious(reason) => {
                        warn!(url = %self.url(), plugin = %manifest.internal_name, %reason, "suspicious manifest");
                    }
                    ManifestValidity::Invalid(reason) => {
                        warn!(url = %self.url(), plugin = %manifest.internal_name, %reason, "dropping invalid manifest");
                        return None;
                    }
                }
                if !self.is_third_party() && manifest.is_hide {
                    debug!(plugin = %manifest.internal_name, "clearing hidden flag on main repository manifest");
                    manifest.is_hide = false;
                }
                Some(Arc::new(manifest))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(url: &str, main: &str) -> PluginRepository {
        PluginRepository::new(build_client().unwrap(), url, main, true)
    }

    #[test]
    fn third_party_is_derived_from_main_url() {
        assert!(!repo("https://a.test/main.json", "https://a.test/main.json").is_third_party());
        assert!(repo("https://b.test/x.json", "https://a.test/main.json").is_third_party());
    }

    #[test]
    fn prepare_sorts_stamps_and_filters() {
        let main = repo("https://a.test/main.json", "https://a.test/main.json");
        let batch: Vec<RemoteManifest> = serde_json::from_str(
            r#"[
                {"InternalName": "zeta", "Name": "Zeta", "AssemblyVersion": "1.0", "IsHide": true},
                {"Name": "Nameless", "AssemblyVersion": "1.0"},
                {"InternalName": "alpha", "Name": "Alpha", "AssemblyVersion": "2.0"}
            ]"#,
        )
        .unwrap();

        let visible = main.prepare(batch);
        let names: Vec<_> = visible.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
        assert!(visible.iter().all(|m| !m.is_hide));
        assert!(visible.iter().all(|m| m.source_url() == Some(main.url())));
    }

    #[test]
    fn third_party_keeps_hidden_flag() {
        let third = repo("https://b.test/x.json", "https://a.test/main.json");
        let batch: Vec<RemoteManifest> = serde_json::from_str(
            r#"[{"InternalName": "zeta", "Name": "Zeta", "AssemblyVersion": "1.0", "IsHide": true}]"#,
        )
        .unwrap();
        let visible = third.prepare(batch);
        assert!(visible[0].is_hide);
        assert!(visible[0].is_third_party());
    }

    #[test]
    fn fresh_repository_is_idle_and_empty() {
        let r = repo("https://a.test/main.json", "https://a.test/main.json");
        assert_eq!(r.state(), RepositoryState::Idle);
        assert!(r.manifests().is_empty());
    }
}
