use super::Response;
use actix_web::{
    get,
    web::{Data, Path, Query},
    HttpResponse,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use typesafe_repository::async_ops::Select;
use vt_types::addon::{match_add_ons, AddOnOption};
use vt_types::catalog::{
    resolve, BrandForest, CatalogStore, FuelType, NotFound, SharedDescription, Stage, VehiclePath,
};
use vt_types::reseller::{
    apply_override, find_override, ByReseller, OverrideKey, OverrideRepository, ResellerOverride,
};
use vt_types::slug::normalize;

#[derive(Deserialize)]
pub struct ViewParams {
    pub reseller: Option<String>,
}

#[derive(Serialize)]
struct BrandIndexEntry {
    name: String,
    slug: String,
    models: Vec<ModelIndexEntry>,
}

#[derive(Serialize)]
struct ModelIndexEntry {
    name: String,
    slug: String,
}

#[get("/api/brands")]
pub async fn list_brands(store: Data<Arc<dyn CatalogStore>>) -> Response {
    let forest = store.fetch_brand_forest().await?;
    let index: Vec<BrandIndexEntry> = forest
        .brands
        .iter()
        .map(|brand| BrandIndexEntry {
            name: brand.name.clone(),
            slug: slug_or_derived(&brand.slug, &brand.name),
            models: brand
                .models
                .iter()
                .map(|model| ModelIndexEntry {
                    name: model.name.clone(),
                    slug: slug_or_derived(&model.slug, &model.name),
                })
                .collect(),
        })
        .collect();
    Ok(HttpResponse::Ok().json(index))
}

fn slug_or_derived(slug: &str, name: &str) -> String {
    if slug.is_empty() {
        normalize(name)
    } else {
        slug.to_string()
    }
}

#[derive(Serialize, Debug)]
pub struct AddOnView {
    pub id: String,
    pub title: String,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub gallery: Vec<String>,
    pub installation_time: Option<u32>,
    pub compatibility_notes: Option<String>,
}

impl From<&AddOnOption> for AddOnView {
    fn from(option: &AddOnOption) -> Self {
        Self {
            id: option.id.clone(),
            title: option.title.clone(),
            price: option.price,
            description: option.description.clone(),
            gallery: option.gallery.clone(),
            installation_time: option.installation_time,
            compatibility_notes: option.compatibility_notes.clone(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct StageView {
    pub name: String,
    pub orig_hk: u32,
    pub tuned_hk: u32,
    pub orig_nm: u32,
    pub tuned_nm: u32,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub add_ons: Vec<AddOnView>,
}

#[derive(Serialize, Debug)]
pub struct VehicleView {
    pub brand: String,
    pub model: String,
    pub year: String,
    pub engine: String,
    pub fuel: FuelType,
    pub logo: Option<String>,
    pub aktplus_visible: bool,
    pub global_add_ons: Vec<AddOnView>,
    pub stages: Vec<StageView>,
}

#[derive(Serialize)]
pub struct StageDetail {
    pub brand: String,
    pub model: String,
    pub year: String,
    pub engine: String,
    pub fuel: FuelType,
    pub logo: Option<String>,
    pub aktplus_visible: bool,
    pub stage: StageView,
}

#[get("/api/vehicles/{brand}/{model}/{year}/{engine}")]
pub async fn vehicle_view(
    path: Path<(String, String, String, String)>,
    params: Query<ViewParams>,
    store: Data<Arc<dyn CatalogStore>>,
    overrides_repo: Data<Arc<dyn OverrideRepository>>,
) -> Response {
    let (brand, model, year, engine) = path.into_inner();
    let path = VehiclePath {
        brand,
        model,
        year,
        engine,
    };
    let (forest, options, shared) = tokio::try_join!(
        store.fetch_brand_forest(),
        store.fetch_add_on_options(),
        store.fetch_stage_descriptions(),
    )?;
    let overrides = match &params.reseller {
        Some(reseller) => {
            overrides_repo
                .select(&ByReseller(reseller.clone()))
                .await?
        }
        None => vec![],
    };
    let view = build_vehicle_view(
        &forest,
        &options,
        &shared,
        &overrides,
        &path,
        params.reseller.as_deref(),
    )?;
    Ok(HttpResponse::Ok().json(view))
}

#[get("/api/vehicles/{brand}/{model}/{year}/{engine}/stages/{stage}")]
pub async fn stage_view(
    path: Path<(String, String, String, String, String)>,
    params: Query<ViewParams>,
    store: Data<Arc<dyn CatalogStore>>,
    overrides_repo: Data<Arc<dyn OverrideRepository>>,
) -> Response {
    let (brand, model, year, engine, stage) = path.into_inner();
    let path = VehiclePath {
        brand,
        model,
        year,
        engine,
    };
    let (forest, options, shared) = tokio::try_join!(
        store.fetch_brand_forest(),
        store.fetch_add_on_options(),
        store.fetch_stage_descriptions(),
    )?;
    let overrides = match &params.reseller {
        Some(reseller) => {
            overrides_repo
                .select(&ByReseller(reseller.clone()))
                .await?
        }
        None => vec![],
    };
    let view = build_vehicle_view(
        &forest,
        &options,
        &shared,
        &overrides,
        &path,
        params.reseller.as_deref(),
    )?;
    let wanted = normalize(&stage);
    let stage = view
        .stages
        .into_iter()
        .find(|s| normalize(&s.name) == wanted)
        .ok_or(super::ControllerError::NotFound)?;
    Ok(HttpResponse::Ok().json(StageDetail {
        brand: view.brand,
        model: view.model,
        year: view.year,
        engine: view.engine,
        fuel: view.fuel,
        logo: view.logo,
        aktplus_visible: view.aktplus_visible,
        stage,
    }))
}

fn override_key(
    brand: &str,
    model: &str,
    year: &str,
    engine: &str,
    reseller_id: &str,
    stage_name: &str,
) -> OverrideKey {
    OverrideKey {
        reseller_id: reseller_id.to_string(),
        brand: brand.to_string(),
        model: model.to_string(),
        year: year.to_string(),
        engine: engine.to_string(),
        stage_name: stage_name.to_string(),
    }
}

/// Assembles the customer-facing view of one vehicle. Overrides are keyed
/// by the stored display values of the resolved vehicle, not by the URL
/// segments the request arrived with.
pub(crate) fn build_vehicle_view(
    forest: &BrandForest,
    options: &[AddOnOption],
    shared: &[SharedDescription],
    overrides: &[ResellerOverride],
    path: &VehiclePath,
    reseller_id: Option<&str>,
) -> Result<VehicleView, NotFound> {
    let vehicle = resolve(forest, path)?;
    let keys: Vec<OverrideKey> = match reseller_id {
        Some(reseller) => vehicle
            .engine
            .stages
            .iter()
            .map(|stage| {
                override_key(
                    &vehicle.brand.name,
                    &vehicle.model.name,
                    &vehicle.year.range,
                    &vehicle.engine.label,
                    reseller,
                    &stage.name,
                )
            })
            .collect(),
        None => vec![],
    };
    let branding = keys.iter().find_map(|key| find_override(overrides, key));
    let aktplus_visible = branding.and_then(|o| o.aktplus_visible).unwrap_or(true);
    let fuel = vehicle.engine.fuel;

    let global_add_ons = if aktplus_visible {
        match_add_ons(options, fuel, None)
            .into_iter()
            .map(AddOnView::from)
            .collect()
    } else {
        vec![]
    };

    let stages = vehicle
        .engine
        .stages
        .iter()
        .enumerate()
        .map(|(i, stage)| {
            let merged = match keys.get(i) {
                Some(key) => apply_override(stage, overrides, key),
                None => stage.clone(),
            };
            let add_ons = if aktplus_visible {
                stage_add_ons(options, fuel, &stage.name)
            } else {
                vec![]
            };
            stage_view_of(&merged, shared, add_ons)
        })
        .collect();

    Ok(VehicleView {
        brand: vehicle.brand.name.clone(),
        model: vehicle.model.name.clone(),
        year: vehicle.year.range.clone(),
        engine: vehicle.engine.label.clone(),
        fuel,
        logo: branding.and_then(|o| o.logo.clone()),
        aktplus_visible,
        global_add_ons,
        stages,
    })
}

// Stage-unrestricted options already appear in the global list; the
// per-stage list carries only the ones gated to this stage.
fn stage_add_ons(options: &[AddOnOption], fuel: FuelType, stage_name: &str) -> Vec<AddOnView> {
    match_add_ons(options, fuel, Some(stage_name))
        .into_iter()
        .filter(|o| o.stage_compatibility.is_some())
        .map(AddOnView::from)
        .collect()
}

fn stage_view_of(stage: &Stage, shared: &[SharedDescription], add_ons: Vec<AddOnView>) -> StageView {
    StageView {
        name: stage.name.clone(),
        orig_hk: stage.orig_hk,
        tuned_hk: stage.tuned_hk,
        orig_nm: stage.orig_nm,
        tuned_nm: stage.tuned_nm,
        price: stage.price,
        description: stage.description_text(shared).map(str::to_string),
        add_ons,
    }
}
