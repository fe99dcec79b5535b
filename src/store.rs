use anyhow::Context;
use async_trait::async_trait;
use itertools::Itertools;
use reqwest::header::AUTHORIZATION;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use rust_decimal::Decimal;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Remove, Save, Select};
use typesafe_repository::{IdentityOf, Repository};
use url::Url;
use vt_types::addon::AddOnOption;
use vt_types::catalog::{
    Brand, BrandForest, CatalogStore, Engine, FuelType, Model, SharedDescription, Stage,
    StageDescription, YearRange,
};
use vt_types::reseller::{ByReseller, OverrideRepository, ResellerOverride};
use vt_types::slug::normalize;

// The full tree is one query; resolution happens in-process, not in the
// query language.
const BRAND_FOREST_QUERY: &str = r#"*[_type == "brand"] | order(orderRank) {
  name, "slug": slug.current,
  models[] { name, "slug": slug.current,
    years[] { range,
      engines[] { label, fuel,
        stages[] { name, origHk, tunedHk, origNm, tunedNm, price,
          description, "descriptionRef": descriptionRef->stageName } } } } }"#;

const ADD_ON_QUERY: &str = r#"*[_type == "aktplusOption"] | order(title asc) {
  "id": _id, title, price, "universal": isUniversal,
  "fuelTypes": applicableFuelTypes, stageCompatibility, description,
  "gallery": gallery[].asset->url, installationTime, compatibilityNotes }"#;

const STAGE_DESCRIPTION_QUERY: &str =
    r#"*[_type == "stageDescription"] { "name": stageName, content }"#;

const OVERRIDES_QUERY: &str = r#"*[_type == "resellerOverride" && resellerId == $resellerId] {
  "id": _id, resellerId, brand, model, year, engine, stageName,
  price, tunedHk, tunedNm, logo, aktplusVisible, "updatedAt": _updatedAt }"#;

/// Client for the hosted content backend. All catalog data lives there;
/// this process keeps no storage of its own.
pub struct ContentApiStore {
    client: ClientWithMiddleware,
    query_endpoint: Url,
    mutate_endpoint: Url,
    token: Option<String>,
}

impl ContentApiStore {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let base = envmnt::get_or("CONTENT_API_URL", "http://127.0.0.1:3333");
        let dataset = envmnt::get_or("CONTENT_API_DATASET", "production");
        let token = Some(envmnt::get_or("CONTENT_API_TOKEN", ""))
            .filter(|t| !t.trim().is_empty());
        let base: Url = base.parse().context("Invalid CONTENT_API_URL")?;
        let query_endpoint = base
            .join(&format!("v1/data/query/{dataset}"))
            .context("Unable to build content query endpoint")?;
        let mutate_endpoint = base
            .join(&format!("v1/data/mutate/{dataset}"))
            .context("Unable to build content mutate endpoint")?;
        Ok(Self::new(query_endpoint, mutate_endpoint, token))
    }

    pub fn new(query_endpoint: Url, mutate_endpoint: Url, token: Option<String>) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Self {
            client,
            query_endpoint,
            mutate_endpoint,
            token,
        }
    }

    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        groq: &str,
        params: &[(&str, String)],
    ) -> Result<T, anyhow::Error> {
        let mut req = self
            .client
            .get(self.query_endpoint.clone())
            .query(&[("query", groq)])
            .query(params);
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let resp = req
            .send()
            .await
            .context("Content store query failed")?
            .error_for_status()
            .context("Content store rejected query")?;
        let body: QueryResponse<T> = resp
            .json()
            .await
            .context("Unable to decode content store response")?;
        Ok(body.result)
    }

    async fn mutate(&self, mutations: serde_json::Value) -> Result<(), anyhow::Error> {
        let mut req = self
            .client
            .post(self.mutate_endpoint.clone())
            .json(&serde_json::json!({ "mutations": mutations }));
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        req.send()
            .await
            .context("Content store mutation failed")?
            .error_for_status()
            .context("Content store rejected mutation")?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct QueryResponse<T> {
    result: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrandDto {
    name: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    models: Vec<ModelDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelDto {
    name: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    years: Vec<YearDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct YearDto {
    range: String,
    #[serde(default)]
    engines: Vec<EngineDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineDto {
    label: String,
    fuel: FuelType,
    #[serde(default)]
    stages: Vec<StageDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageDto {
    name: String,
    #[serde(default)]
    orig_hk: u32,
    #[serde(default)]
    tuned_hk: u32,
    #[serde(default)]
    orig_nm: u32,
    #[serde(default)]
    tuned_nm: u32,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    description_ref: Option<String>,
}

impl From<BrandDto> for Brand {
    fn from(dto: BrandDto) -> Brand {
        Brand {
            // Older documents predate the slug field; the canonical slug is
            // then derived with the same normalizer the resolver matches with.
            slug: dto
                .slug
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| normalize(&dto.name)),
            name: dto.name,
            models: dto.models.into_iter().map(Model::from).collect(),
        }
    }
}

impl From<ModelDto> for Model {
    fn from(dto: ModelDto) -> Model {
        Model {
            slug: dto
                .slug
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| normalize(&dto.name)),
            name: dto.name,
            years: dto.years.into_iter().map(YearRange::from).collect(),
        }
    }
}

impl From<YearDto> for YearRange {
    fn from(dto: YearDto) -> YearRange {
        YearRange {
            range: dto.range,
            engines: dto.engines.into_iter().map(Engine::from).collect(),
        }
    }
}

impl From<EngineDto> for Engine {
    fn from(dto: EngineDto) -> Engine {
        Engine {
            label: dto.label,
            fuel: dto.fuel,
            stages: dto.stages.into_iter().map(Stage::from).collect(),
        }
    }
}

impl From<StageDto> for Stage {
    fn from(dto: StageDto) -> Stage {
        Stage {
            name: dto.name,
            orig_hk: dto.orig_hk,
            tuned_hk: dto.tuned_hk,
            orig_nm: dto.orig_nm,
            tuned_nm: dto.tuned_nm,
            price: dto.price,
            description: StageDescription::from_parts(dto.description_ref, dto.description),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddOnDto {
    id: String,
    title: String,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    universal: bool,
    #[serde(default)]
    fuel_types: Vec<FuelType>,
    #[serde(default)]
    stage_compatibility: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    gallery: Vec<String>,
    #[serde(default)]
    installation_time: Option<u32>,
    #[serde(default)]
    compatibility_notes: Option<String>,
}

impl From<AddOnDto> for AddOnOption {
    fn from(dto: AddOnDto) -> AddOnOption {
        AddOnOption {
            id: dto.id,
            title: dto.title,
            price: dto.price,
            universal: dto.universal,
            fuel_types: dto.fuel_types,
            stage_compatibility: dto.stage_compatibility.filter(|s| !s.is_empty()),
            description: dto.description,
            gallery: dto.gallery,
            installation_time: dto.installation_time,
            compatibility_notes: dto.compatibility_notes,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverrideDto {
    id: uuid::Uuid,
    reseller_id: String,
    brand: String,
    model: String,
    year: String,
    engine: String,
    stage_name: String,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    tuned_hk: Option<u32>,
    #[serde(default)]
    tuned_nm: Option<u32>,
    #[serde(default)]
    logo: Option<String>,
    #[serde(default)]
    aktplus_visible: Option<bool>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    updated_at: Option<OffsetDateTime>,
}

impl From<OverrideDto> for ResellerOverride {
    fn from(dto: OverrideDto) -> ResellerOverride {
        ResellerOverride {
            id: dto.id,
            reseller_id: dto.reseller_id,
            brand: dto.brand,
            model: dto.model,
            year: dto.year,
            engine: dto.engine,
            stage_name: dto.stage_name,
            price: dto.price,
            tuned_hk: dto.tuned_hk,
            tuned_nm: dto.tuned_nm,
            logo: dto.logo,
            aktplus_visible: dto.aktplus_visible,
            updated_at: dto.updated_at.unwrap_or_else(OffsetDateTime::now_utc),
        }
    }
}

#[async_trait]
impl CatalogStore for ContentApiStore {
    async fn fetch_brand_forest(&self) -> Result<BrandForest, anyhow::Error> {
        let brands: Vec<BrandDto> = self.query(BRAND_FOREST_QUERY, &[]).await?;
        Ok(BrandForest {
            brands: brands.into_iter().map(Brand::from).collect(),
        })
    }

    async fn fetch_add_on_options(&self) -> Result<Vec<AddOnOption>, anyhow::Error> {
        let options: Vec<AddOnDto> = self.query(ADD_ON_QUERY, &[]).await?;
        Ok(options.into_iter().map(AddOnOption::from).collect())
    }

    async fn fetch_stage_descriptions(&self) -> Result<Vec<SharedDescription>, anyhow::Error> {
        let descriptions: Vec<SharedDescription> =
            self.query(STAGE_DESCRIPTION_QUERY, &[]).await?;
        // Shared documents are keyed by stage name; keep the first of any
        // duplicated key, consistent with first-match resolution elsewhere.
        Ok(descriptions
            .into_iter()
            .unique_by(|d| d.name.clone())
            .collect())
    }
}

impl Repository<ResellerOverride> for ContentApiStore {
    type Error = anyhow::Error;
}

#[async_trait]
impl Select<ResellerOverride, ByReseller> for ContentApiStore {
    async fn select(
        &self,
        ByReseller(reseller_id): &ByReseller,
    ) -> Result<Vec<ResellerOverride>, Self::Error> {
        let params = [(
            "$resellerId",
            serde_json::to_string(reseller_id).context("Unable to encode reseller id")?,
        )];
        let overrides: Vec<OverrideDto> = self.query(OVERRIDES_QUERY, &params).await?;
        Ok(overrides.into_iter().map(ResellerOverride::from).collect())
    }
}

#[async_trait]
impl Save<ResellerOverride> for ContentApiStore {
    async fn save(&self, o: ResellerOverride) -> Result<(), Self::Error> {
        let updated_at = o
            .updated_at
            .format(&Rfc3339)
            .context("Unable to format override timestamp")?;
        self.mutate(serde_json::json!([{
            "createOrReplace": {
                "_id": o.id.to_string(),
                "_type": "resellerOverride",
                "resellerId": o.reseller_id,
                "brand": o.brand,
                "model": o.model,
                "year": o.year,
                "engine": o.engine,
                "stageName": o.stage_name,
                "price": o.price,
                "tunedHk": o.tuned_hk,
                "tunedNm": o.tuned_nm,
                "logo": o.logo,
                "aktplusVisible": o.aktplus_visible,
                "updatedAt": updated_at,
            }
        }]))
        .await
    }
}

#[async_trait]
impl Remove<ResellerOverride> for ContentApiStore {
    async fn remove(&self, id: &IdentityOf<ResellerOverride>) -> Result<(), Self::Error> {
        self.mutate(serde_json::json!([{
            "delete": { "id": id.to_string() }
        }]))
        .await
    }
}

impl OverrideRepository for ContentApiStore {}

#[cfg(test)]
mod test {
    use super::*;
    use rust_decimal_macros::dec;
    use vt_types::catalog::resolve;
    use vt_types::catalog::VehiclePath;

    const FOREST_FIXTURE: &str = r#"{
        "result": [{
            "name": "BMW",
            "slug": "bmw",
            "models": [{
                "name": "M3",
                "slug": "m3",
                "years": [{
                    "range": "2012→2016",
                    "engines": [{
                        "label": "S65 V8",
                        "fuel": "bensin",
                        "stages": [{
                            "name": "Steg 1",
                            "origHk": 420,
                            "tunedHk": 450,
                            "origNm": 400,
                            "tunedNm": 550,
                            "price": 4990,
                            "description": "inline fallback",
                            "descriptionRef": "Steg 1"
                        }]
                    }]
                }]
            }]
        }]
    }"#;

    fn forest_from_fixture() -> BrandForest {
        let body: QueryResponse<Vec<BrandDto>> =
            serde_json::from_str(FOREST_FIXTURE).expect("fixture should decode");
        BrandForest {
            brands: body.result.into_iter().map(Brand::from).collect(),
        }
    }

    #[test]
    fn decodes_storage_documents_into_domain_tree() {
        let forest = forest_from_fixture();
        let vehicle = resolve(
            &forest,
            &VehiclePath {
                brand: "bmw".to_string(),
                model: "m3".to_string(),
                year: "2012-2016".to_string(),
                engine: "s65-v8".to_string(),
            },
        )
        .expect("fixture path should resolve");
        assert_eq!(vehicle.engine.fuel, FuelType::Petrol);
        let stage = &vehicle.engine.stages[0];
        assert_eq!(stage.tuned_hk, 450);
        assert_eq!(stage.price, Some(dec!(4990)));
        // Reference beats the inline fallback carried by older documents.
        assert_eq!(
            stage.description,
            Some(StageDescription::Shared("Steg 1".to_string()))
        );
    }

    #[test]
    fn missing_slug_falls_back_to_normalized_name() {
        let dto = BrandDto {
            name: "Mercedes-Benz".to_string(),
            slug: None,
            models: vec![],
        };
        let brand = Brand::from(dto);
        assert_eq!(brand.slug, "mercedes-benz");
    }

    #[test]
    fn decodes_add_on_documents() {
        let json = r#"{
            "result": [{
                "id": "opt-1",
                "title": "Vmax removal",
                "price": 1490,
                "universal": false,
                "fuelTypes": ["bensin", "diesel"],
                "stageCompatibility": "",
                "installationTime": 2
            }]
        }"#;
        let body: QueryResponse<Vec<AddOnDto>> =
            serde_json::from_str(json).expect("fixture should decode");
        let option = AddOnOption::from(body.result.into_iter().next().expect("one option"));
        assert_eq!(option.fuel_types, vec![FuelType::Petrol, FuelType::Diesel]);
        // An empty stage gate in storage means "no gate".
        assert_eq!(option.stage_compatibility, None);
        assert_eq!(option.installation_time, Some(2));
    }
}
