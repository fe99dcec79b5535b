use super::{ControllerError, InputData, Response};
use crate::{empty_string_as_none, empty_string_as_none_parse};
use actix::Addr;
use actix_web::{
    get, post,
    web::{Data, Path},
    HttpResponse,
};
use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Remove, Save, Select};
use uuid::Uuid;
use vt_types::reseller::service::{self, ResellerService};
use vt_types::reseller::{
    rate, Banner, ByReseller, Currency, Language, OverrideKey, OverrideRepository, ResellerConfig,
    ResellerOverride,
};

#[derive(Serialize)]
struct ConfigView {
    #[serde(flatten)]
    config: ResellerConfig,
    rate: Option<Decimal>,
}

#[get("/api/resellers/{id}/config")]
pub async fn get_config(id: Path<String>, service: Data<Addr<ResellerService>>) -> Response {
    let config = service
        .send(service::Get(id.into_inner()))
        .await??
        .ok_or(ControllerError::NotFound)?;
    let rate = rate(config.currency);
    Ok(HttpResponse::Ok().json(ConfigView { config, rate }))
}

#[derive(Deserialize)]
pub struct ConfigForm {
    pub name: String,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub logo: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none_parse")]
    pub show_aktplus: Option<bool>,
    #[serde(default, deserialize_with = "empty_string_as_none_parse")]
    pub show_prices: Option<bool>,
    #[serde(default, deserialize_with = "empty_string_as_none_parse")]
    pub show_gallery: Option<bool>,
    #[serde(default, deserialize_with = "empty_string_as_none_parse")]
    pub show_contact_form: Option<bool>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub banner_headline: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub banner_body: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub banner_image: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub banner_link: Option<String>,
}

#[post("/api/resellers/{id}/config")]
pub async fn update_config(
    id: Path<String>,
    data: InputData<ConfigForm>,
    service: Data<Addr<ResellerService>>,
) -> Response {
    let id = id.into_inner();
    let form = data.into_inner();
    require_field("name", &form.name)?;
    let mut config = service
        .send(service::Get(id.clone()))
        .await??
        .unwrap_or_else(|| ResellerConfig {
            id: id.clone(),
            name: String::new(),
            currency: Currency::default(),
            language: Language::default(),
            logo: None,
            sections: Default::default(),
            banner: None,
        });
    config.name = form.name;
    if let Some(currency) = form.currency {
        config.currency = currency;
    }
    if let Some(language) = form.language {
        config.language = language;
    }
    config.logo = form.logo;
    if let Some(v) = form.show_aktplus {
        config.sections.aktplus = v;
    }
    if let Some(v) = form.show_prices {
        config.sections.prices = v;
    }
    if let Some(v) = form.show_gallery {
        config.sections.gallery = v;
    }
    if let Some(v) = form.show_contact_form {
        config.sections.contact_form = v;
    }
    config.banner = form.banner_headline.map(|headline| Banner {
        headline,
        body: form.banner_body,
        image: form.banner_image,
        link: form.banner_link,
    });
    service.send(service::Update(config.clone())).await??;
    Ok(HttpResponse::Ok().json(config))
}

#[derive(Serialize)]
struct OverrideEntry {
    digest: String,
    #[serde(flatten)]
    inner: ResellerOverride,
}

#[get("/api/resellers/{id}/overrides")]
pub async fn list_overrides(
    id: Path<String>,
    repo: Data<Arc<dyn OverrideRepository>>,
) -> Response {
    let mut overrides = repo.select(&ByReseller(id.into_inner())).await?;
    overrides.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let entries: Vec<OverrideEntry> = overrides
        .into_iter()
        .map(|o| OverrideEntry {
            digest: format!("{:016x}", o.key().digest()),
            inner: o,
        })
        .collect();
    Ok(HttpResponse::Ok().json(entries))
}

#[derive(Deserialize)]
pub struct OverrideForm {
    pub brand: String,
    pub model: String,
    pub year: String,
    pub engine: String,
    pub stage_name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_string_as_none_parse")]
    pub tuned_hk: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none_parse")]
    pub tuned_nm: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub logo: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none_parse")]
    pub aktplus_visible: Option<bool>,
}

#[post("/api/resellers/{id}/overrides")]
pub async fn upsert_override(
    id: Path<String>,
    data: InputData<OverrideForm>,
    repo: Data<Arc<dyn OverrideRepository>>,
) -> Response {
    let reseller_id = id.into_inner();
    let form = data.into_inner();
    require_field("brand", &form.brand)?;
    require_field("model", &form.model)?;
    require_field("year", &form.year)?;
    require_field("engine", &form.engine)?;
    require_field("stage_name", &form.stage_name)?;

    let key = OverrideKey {
        reseller_id: reseller_id.clone(),
        brand: form.brand.clone(),
        model: form.model.clone(),
        year: form.year.clone(),
        engine: form.engine.clone(),
        stage_name: form.stage_name.clone(),
    };
    // One row per composite key; a repeated submit replaces, never duplicates.
    let existing = repo.select(&ByReseller(reseller_id.clone())).await?;
    let id = existing
        .iter()
        .find(|o| o.matches(&key))
        .map(|o| o.id)
        .unwrap_or_else(Uuid::new_v4);

    let entry = ResellerOverride {
        id,
        reseller_id,
        brand: form.brand,
        model: form.model,
        year: form.year,
        engine: form.engine,
        stage_name: form.stage_name,
        price: form.price,
        tuned_hk: form.tuned_hk,
        tuned_nm: form.tuned_nm,
        logo: form.logo,
        aktplus_visible: form.aktplus_visible,
        updated_at: OffsetDateTime::now_utc(),
    };
    let digest = format!("{:016x}", entry.key().digest());
    repo.save(entry).await.context("Unable to save override")?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "digest": digest })))
}

#[post("/api/resellers/{id}/overrides/{digest}/remove")]
pub async fn remove_override(
    path: Path<(String, String)>,
    repo: Data<Arc<dyn OverrideRepository>>,
) -> Response {
    let (reseller_id, digest) = path.into_inner();
    let overrides = repo.select(&ByReseller(reseller_id)).await?;
    let entry = overrides
        .iter()
        .find(|o| format!("{:016x}", o.key().digest()) == digest)
        .ok_or(ControllerError::NotFound)?;
    repo.remove(&entry.id)
        .await
        .context("Unable to remove override")?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "removed": digest })))
}

fn require_field(field: &str, value: &str) -> Result<(), ControllerError> {
    if value.trim().is_empty() {
        return Err(ControllerError::InvalidInput {
            field: field.to_string(),
            msg: "must not be blank".to_string(),
        });
    }
    Ok(())
}
