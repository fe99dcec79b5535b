use crate::addon::AddOnOption;
use crate::slug::normalize;
use async_trait::async_trait;
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fuel type of an engine. The storage layer historically used the Swedish
/// label "bensin" for petrol, so both spellings deserialize to the same
/// variant.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    #[display("diesel")]
    Diesel,
    #[serde(alias = "bensin")]
    #[display("petrol")]
    Petrol,
    #[display("hybrid")]
    Hybrid,
    #[serde(alias = "el")]
    #[display("electric")]
    Electric,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Brand {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub models: Vec<Model>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Model {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub years: Vec<YearRange>,
}

/// A free-text range label like "2012-2016". There is no structured
/// start/end; uniqueness within a model is assumed, not enforced.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct YearRange {
    pub range: String,
    #[serde(default)]
    pub engines: Vec<Engine>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Engine {
    pub label: String,
    pub fuel: FuelType,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

/// Stage description exists in two storage representations for historical
/// reasons: a reference to a shared description document keyed by stage
/// name, or inline text. The reference wins when both are present; the
/// precedence is applied once, in [`StageDescription::from_parts`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StageDescription {
    Shared(String),
    Inline(String),
}

impl StageDescription {
    pub fn from_parts(shared: Option<String>, inline: Option<String>) -> Option<Self> {
        shared
            .filter(|name| !name.is_empty())
            .map(Self::Shared)
            .or(inline.map(Self::Inline))
    }
}

/// A shared description document, keyed by stage name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SharedDescription {
    pub name: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Stage {
    pub name: String,
    pub orig_hk: u32,
    pub tuned_hk: u32,
    pub orig_nm: u32,
    pub tuned_nm: u32,
    pub price: Option<Decimal>,
    #[serde(default)]
    pub description: Option<StageDescription>,
}

impl Stage {
    /// Resolves the description against the shared description documents.
    /// A dangling reference yields no text rather than falling back to an
    /// inline value that was already superseded at construction time.
    pub fn description_text<'a>(&'a self, shared: &'a [SharedDescription]) -> Option<&'a str> {
        match &self.description {
            Some(StageDescription::Shared(name)) => shared
                .iter()
                .find(|d| &d.name == name)
                .map(|d| d.content.as_str()),
            Some(StageDescription::Inline(text)) => Some(text.as_str()),
            None => None,
        }
    }
}

/// The full nested brand → model → year → engine → stage tree, in storage
/// order. Child order is meaningful: path resolution is first-match.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BrandForest {
    pub brands: Vec<Brand>,
}

/// The four URL path segments identifying an engine.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VehiclePath {
    pub brand: String,
    pub model: String,
    pub year: String,
    pub engine: String,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum PathLevel {
    #[display("brand")]
    Brand,
    #[display("model")]
    Model,
    #[display("year")]
    Year,
    #[display("engine")]
    Engine,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[display("no matching {level}")]
pub struct NotFound {
    pub level: PathLevel,
}

impl std::error::Error for NotFound {}

#[derive(Clone, Copy, Debug)]
pub struct ResolvedVehicle<'a> {
    pub brand: &'a Brand,
    pub model: &'a Model,
    pub year: &'a YearRange,
    pub engine: &'a Engine,
}

/// Walks the tree one level at a time, failing at the first level with no
/// match. Brand and model carry a stored slug, so those levels prefer slug
/// equality and fall back to name equality; year and engine only have a
/// free-text label. All comparisons go through [`normalize`], since the
/// URL-safe form and the stored display form diverge (e.g. "2012→2016" in
/// storage vs "2012-2016" in the URL). Duplicated normalized keys resolve
/// to the first child in storage order.
pub fn resolve<'a>(
    forest: &'a BrandForest,
    path: &VehiclePath,
) -> Result<ResolvedVehicle<'a>, NotFound> {
    let brand = find_sluggable(&forest.brands, &path.brand, |b| &b.slug, |b| &b.name)
        .ok_or(NotFound { level: PathLevel::Brand })?;
    let model = find_sluggable(&brand.models, &path.model, |m| &m.slug, |m| &m.name)
        .ok_or(NotFound { level: PathLevel::Model })?;
    let year = find_labeled(&model.years, &path.year, |y| &y.range)
        .ok_or(NotFound { level: PathLevel::Year })?;
    let engine = find_labeled(&year.engines, &path.engine, |e| &e.label)
        .ok_or(NotFound { level: PathLevel::Engine })?;
    Ok(ResolvedVehicle {
        brand,
        model,
        year,
        engine,
    })
}

fn find_sluggable<'a, T>(
    items: &'a [T],
    segment: &str,
    slug: impl Fn(&T) -> &str,
    name: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    let segment = normalize(segment);
    items
        .iter()
        .find(|i| normalize(slug(i)) == segment)
        .or_else(|| items.iter().find(|i| normalize(name(i)) == segment))
}

fn find_labeled<'a, T>(
    items: &'a [T],
    segment: &str,
    label: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    let segment = normalize(segment);
    items.iter().find(|i| normalize(label(i)) == segment)
}

/// Read-only view of the external content backend. Injected into the
/// serving layer as `Arc<dyn CatalogStore>` so tests can substitute an
/// in-memory double.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn fetch_brand_forest(&self) -> Result<BrandForest, anyhow::Error>;
    async fn fetch_add_on_options(&self) -> Result<Vec<AddOnOption>, anyhow::Error>;
    async fn fetch_stage_descriptions(&self) -> Result<Vec<SharedDescription>, anyhow::Error>;
}
