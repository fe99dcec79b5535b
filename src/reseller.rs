use anyhow::Context as AnyhowContext;
use async_trait::async_trait;
use serde_json::Value;
use typesafe_repository::{
    async_ops::{Get, List, Remove, Save},
    IdentityOf, Repository,
};
use vt_types::reseller::{ResellerConfig, ResellerRepository};

/// Reseller portal configuration lives in flat JSON files, one per
/// reseller, editable without a redeploy.
pub struct FileSystemResellerRepository {}

impl FileSystemResellerRepository {
    pub fn new() -> Self {
        Self {}
    }
}

impl Repository<ResellerConfig> for FileSystemResellerRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Get<ResellerConfig> for FileSystemResellerRepository {
    async fn get_one(
        &self,
        id: &IdentityOf<ResellerConfig>,
    ) -> Result<Option<ResellerConfig>, anyhow::Error> {
        match read_reseller(id) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
                    if io_err.kind() == std::io::ErrorKind::NotFound {
                        return Ok(None);
                    }
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl Save<ResellerConfig> for FileSystemResellerRepository {
    async fn save(&self, config: ResellerConfig) -> Result<(), anyhow::Error> {
        let path = format!("{CONFIG_DIR}/{}.json", config.id);
        tokio::fs::create_dir_all(CONFIG_DIR).await?;
        tokio::fs::write(&path, serde_json::to_string_pretty(&config)?).await?;
        Ok(())
    }
}

#[async_trait]
impl List<ResellerConfig> for FileSystemResellerRepository {
    async fn list(&self) -> Result<Vec<ResellerConfig>, anyhow::Error> {
        let mut configs = vec![];
        let res = match std::fs::read_dir(CONFIG_DIR) {
            Ok(r) => r,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };
        for f in res {
            let entry = f?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or(anyhow::anyhow!("Unable to convert file name to string"))?
                .to_string();
            configs.push(read_reseller(&id)?);
        }
        Ok(configs)
    }
}

#[async_trait]
impl Remove<ResellerConfig> for FileSystemResellerRepository {
    async fn remove(&self, id: &IdentityOf<ResellerConfig>) -> Result<(), anyhow::Error> {
        std::fs::remove_file(format!("{CONFIG_DIR}/{id}.json"))
            .context("Unable to remove configuration file")?;
        Ok(())
    }
}

impl ResellerRepository for FileSystemResellerRepository {}

const CONFIG_DIR: &str = "resellers.d";

// The file name is the identity; the stored document never repeats it.
pub fn read_reseller(id: &IdentityOf<ResellerConfig>) -> Result<ResellerConfig, anyhow::Error> {
    let config = std::fs::read_to_string(format!("{CONFIG_DIR}/{id}.json"))?;
    let value = serde_json::from_str(&config)?;
    let value = match value {
        Value::Object(mut map) => {
            map.insert("id".to_string(), Value::String(id.to_string()));
            Value::Object(map)
        }
        val => val,
    };
    let config = serde_json::from_value(value)?;
    Ok(config)
}
