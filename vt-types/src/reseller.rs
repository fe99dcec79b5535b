use crate::catalog::Stage;
use derive_more::Display;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_option_number_from_string;
use std::collections::HashMap;
use std::hash::Hash;
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Get, List, Remove, Save, Select};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::{SelectBy, Selector};
use uuid::Uuid;
use xxhash_rust::xxh3::Xxh3;

pub mod service;

/// Composite lookup key for a reseller override. Overrides are keyed at
/// write time with the literal display values the admin UI showed, so
/// equality here is plain string equality per field — never normalized and
/// never a joined string (a brand containing a delimiter character must
/// not collide with a differently-split key).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OverrideKey {
    pub reseller_id: String,
    pub brand: String,
    pub model: String,
    pub year: String,
    pub engine: String,
    pub stage_name: String,
}

impl OverrideKey {
    /// Stable per-key digest used to address override entries in admin
    /// routes, the same way export entries are addressed by hash.
    pub fn digest(&self) -> u64 {
        let mut hasher = Xxh3::with_seed(0);
        self.hash(&mut hasher);
        hasher.digest()
    }
}

/// Partner-specific replacement values for one stage. Absent fields fall
/// through to the base record. No versioning; last write wins.
#[derive(Id, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[Id(ref_id, get_id)]
pub struct ResellerOverride {
    pub id: Uuid,
    pub reseller_id: String,
    pub brand: String,
    pub model: String,
    pub year: String,
    pub engine: String,
    pub stage_name: String,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub tuned_hk: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub tuned_nm: Option<u32>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub aktplus_visible: Option<bool>,
    #[serde(default = "default_time", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn default_time() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

impl ResellerOverride {
    pub fn key(&self) -> OverrideKey {
        OverrideKey {
            reseller_id: self.reseller_id.clone(),
            brand: self.brand.clone(),
            model: self.model.clone(),
            year: self.year.clone(),
            engine: self.engine.clone(),
            stage_name: self.stage_name.clone(),
        }
    }

    pub fn matches(&self, key: &OverrideKey) -> bool {
        self.reseller_id == key.reseller_id
            && self.brand == key.brand
            && self.model == key.model
            && self.year == key.year
            && self.engine == key.engine
            && self.stage_name == key.stage_name
    }
}

/// First override matching the key, in input order. Multiple matches are
/// not expected; picking the first keeps the outcome deterministic.
pub fn find_override<'a>(
    overrides: &'a [ResellerOverride],
    key: &OverrideKey,
) -> Option<&'a ResellerOverride> {
    overrides.iter().find(|o| o.matches(key))
}

/// Shallow-merges the matching override onto the base stage: `price`,
/// `tuned_hk` and `tuned_nm` replace the base fields when set, everything
/// else passes through unchanged. A missing override is not an error; the
/// base stage comes back as-is.
pub fn apply_override(
    stage: &Stage,
    overrides: &[ResellerOverride],
    key: &OverrideKey,
) -> Stage {
    let mut merged = stage.clone();
    if let Some(o) = find_override(overrides, key) {
        if o.price.is_some() {
            merged.price = o.price;
        }
        if let Some(hk) = o.tuned_hk {
            merged.tuned_hk = hk;
        }
        if let Some(nm) = o.tuned_nm {
            merged.tuned_nm = nm;
        }
    }
    merged
}

pub struct ByReseller(pub String);

impl Selector for ByReseller {}
impl SelectBy<ByReseller> for ResellerOverride {}

pub trait OverrideRepository:
    Repository<ResellerOverride, Error = anyhow::Error>
    + Save<ResellerOverride>
    + Remove<ResellerOverride>
    + Select<ResellerOverride, ByReseller>
    + Send
    + Sync
{
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    #[display("SEK")]
    Sek,
    #[display("EUR")]
    Eur,
    #[display("USD")]
    Usd,
    #[display("NOK")]
    Nok,
    #[display("DKK")]
    Dkk,
}

impl Default for Currency {
    fn default() -> Self {
        Self::Sek
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[display("sv")]
    Sv,
    #[display("en")]
    En,
    #[display("de")]
    De,
    #[display("no")]
    No,
}

impl Default for Language {
    fn default() -> Self {
        Self::Sv
    }
}

// Catalog prices are stored in SEK; the table holds SEK per unit of the
// display currency.
static RATES: Lazy<HashMap<Currency, Decimal>> = Lazy::new(|| {
    HashMap::from([
        (Currency::Sek, dec!(1)),
        (Currency::Eur, dec!(11.42)),
        (Currency::Usd, dec!(10.51)),
        (Currency::Nok, dec!(0.99)),
        (Currency::Dkk, dec!(1.53)),
    ])
});

pub fn rate(currency: Currency) -> Option<Decimal> {
    RATES.get(&currency).copied()
}

/// Converts an SEK amount into the given display currency.
pub fn convert(amount: Decimal, currency: Currency) -> Option<Decimal> {
    rate(currency).map(|r| (amount / r).round_dp(2))
}

/// Which storefront sections a white-label reseller site shows.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SectionVisibility {
    #[serde(default = "bool_true")]
    pub aktplus: bool,
    #[serde(default = "bool_true")]
    pub prices: bool,
    #[serde(default = "bool_true")]
    pub gallery: bool,
    #[serde(default = "bool_true")]
    pub contact_form: bool,
}

impl Default for SectionVisibility {
    fn default() -> Self {
        Self {
            aktplus: true,
            prices: true,
            gallery: true,
            contact_form: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Banner {
    pub headline: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

/// Per-reseller display and branding settings. Independent of the override
/// mechanism; consumed only by the presentation layer.
#[derive(Id, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[Id(ref_id, get_id)]
pub struct ResellerConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub sections: SectionVisibility,
    #[serde(default)]
    pub banner: Option<Banner>,
}

pub trait ResellerRepository:
    Repository<ResellerConfig, Error = anyhow::Error>
    + Get<ResellerConfig>
    + List<ResellerConfig>
    + Save<ResellerConfig>
    + Remove<ResellerConfig>
    + Send
    + Sync
{
}

fn bool_true() -> bool {
    true
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::{Stage, StageDescription};

    fn base_stage() -> Stage {
        Stage {
            name: "Steg 1".to_string(),
            orig_hk: 420,
            tuned_hk: 450,
            orig_nm: 400,
            tuned_nm: 550,
            price: Some(dec!(4990)),
            description: Some(StageDescription::Inline("text".to_string())),
        }
    }

    fn key() -> OverrideKey {
        OverrideKey {
            reseller_id: "r1".to_string(),
            brand: "BMW".to_string(),
            model: "M3".to_string(),
            year: "2012→2016".to_string(),
            engine: "S65 V8".to_string(),
            stage_name: "Steg 1".to_string(),
        }
    }

    fn override_for(key: &OverrideKey) -> ResellerOverride {
        ResellerOverride {
            id: Uuid::new_v4(),
            reseller_id: key.reseller_id.clone(),
            brand: key.brand.clone(),
            model: key.model.clone(),
            year: key.year.clone(),
            engine: key.engine.clone(),
            stage_name: key.stage_name.clone(),
            price: None,
            tuned_hk: None,
            tuned_nm: None,
            logo: None,
            aktplus_visible: None,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn set_fields_replace_unset_fields_pass_through() {
        let key = key();
        let mut o = override_for(&key);
        o.price = Some(dec!(45000));
        let merged = apply_override(&base_stage(), &[o], &key);
        assert_eq!(merged.price, Some(dec!(45000)));
        assert_eq!(merged.tuned_hk, 450);
        assert_eq!(merged.tuned_nm, 550);
        assert_eq!(merged.orig_hk, 420);
        assert_eq!(merged.name, "Steg 1");
        assert_eq!(
            merged.description,
            Some(StageDescription::Inline("text".to_string()))
        );
    }

    #[test]
    fn missing_override_returns_base_unchanged() {
        let merged = apply_override(&base_stage(), &[], &key());
        assert_eq!(merged, base_stage());
    }

    #[test]
    fn key_matching_is_literal_not_normalized() {
        let key = key();
        let mut o = override_for(&key);
        o.year = "2012-2016".to_string();
        o.price = Some(dec!(45000));
        // "2012-2016" and "2012→2016" normalize identically for path
        // resolution, but override keys compare stored values.
        let merged = apply_override(&base_stage(), &[o], &key);
        assert_eq!(merged.price, Some(dec!(4990)));
    }

    #[test]
    fn first_of_duplicate_matches_wins() {
        let key = key();
        let mut first = override_for(&key);
        first.tuned_hk = Some(470);
        let mut second = override_for(&key);
        second.tuned_hk = Some(500);
        let merged = apply_override(&base_stage(), &[first, second], &key);
        assert_eq!(merged.tuned_hk, 470);
    }

    #[test]
    fn delimiter_bearing_fields_do_not_collide() {
        let a = OverrideKey {
            reseller_id: "r1".to_string(),
            brand: "A|B".to_string(),
            model: "C".to_string(),
            year: "".to_string(),
            engine: "".to_string(),
            stage_name: "".to_string(),
        };
        let b = OverrideKey {
            brand: "A".to_string(),
            model: "B|C".to_string(),
            ..a.clone()
        };
        assert_ne!(a, b);
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn digest_is_stable_per_key() {
        assert_eq!(key().digest(), key().digest());
    }

    #[test]
    fn currency_conversion_uses_static_table() {
        assert_eq!(convert(dec!(1142), Currency::Eur), Some(dec!(100.00)));
        assert_eq!(convert(dec!(4990), Currency::Sek), Some(dec!(4990.00)));
        assert_eq!(rate(Currency::Sek), Some(dec!(1)));
    }

    #[test]
    fn config_defaults_show_everything() {
        let config: ResellerConfig =
            serde_json::from_str(r#"{"id": "r1", "name": "Nordic Performance"}"#)
                .expect("minimal config should deserialize");
        assert!(config.sections.aktplus);
        assert!(config.sections.prices);
        assert_eq!(config.currency, Currency::Sek);
        assert_eq!(config.language, Language::Sv);
        assert_eq!(config.banner, None);
    }
}
