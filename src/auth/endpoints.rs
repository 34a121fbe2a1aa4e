use crate::types::Cloud;

/// Identity-platform and Graph roots for a Microsoft national cloud.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub authority: &'static str,
    pub graph: &'static str,
}

impl Endpoints {
    pub fn for_cloud(cloud: Cloud) -> Self {
        match cloud {
            Cloud::Global => Self {
                authority: "https://login.microsoftonline.com",
                graph: "https://graph.microsoft.com",
            },
            Cloud::China => Self {
                authority: "https://login.chinacloudapi.cn",
                graph: "https://microsoftgraph.chinacloudapi.cn",
            },
            Cloud::UsGov => Self {
                authority: "https://login.microsoftonline.us",
                graph: "https://graph.microsoft.us",
            },
        }
    }

    pub fn device_code_url(&self, tenant: &str) -> String {
        format!("{}/{}/oauth2/v2.0/devicecode", self.authority, tenant)
    }

    pub fn token_url(&self, tenant: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, tenant)
    }

    /// Graph v1.0 API root, without a trailing slash.
    pub fn graph_api(&self) -> String {
        format!("{}/v1.0", self.graph)
    }

    /// Delegated scopes requested for the run. `offline_access` yields a
    /// refresh token so later runs (and 401 recovery) skip the prompt.
    pub fn scopes(&self) -> String {
        format!(
            "{g}/Files.ReadWrite.All {g}/Sites.ReadWrite.All offline_access",
            g = self.graph
        )
    }
}
