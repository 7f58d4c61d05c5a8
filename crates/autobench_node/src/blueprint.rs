use serde::Deserialize;

/// Desired provisioning parameters of one remote host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeBlueprint {
    pub host: String,
    #[serde(default)]
    pub data_path: Option<String>,
    #[serde(default)]
    pub index_path: Option<String>,
}

impl NodeBlueprint {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            data_path: None,
            index_path: None,
        }
    }

    pub fn with_data_path(mut self, path: impl Into<String>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    pub fn with_index_path(mut self, path: impl Into<String>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Data path, treating an empty string as unset.
    pub fn data_path(&self) -> Option<&str> {
        non_empty(self.data_path.as_deref())
    }

    /// Index path, treating an empty string as unset.
    pub fn index_path(&self) -> Option<&str> {
        non_empty(self.index_path.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
