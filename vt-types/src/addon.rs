use crate::catalog::FuelType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_option_number_from_string;

/// An optional upgrade purchasable alongside a tuning stage.
///
/// Two eligibility axes are independent and must stay independent:
/// `universal` widens the *fuel* condition to every fuel type, while an
/// unset `stage_compatibility` widens the *stage* condition to every stage
/// of an eligible engine. The admin surface tends to set both together,
/// but fuel-specific stage-unrestricted options are valid data.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AddOnOption {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub universal: bool,
    #[serde(default)]
    pub fuel_types: Vec<FuelType>,
    #[serde(default)]
    pub stage_compatibility: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub gallery: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub installation_time: Option<u32>,
    #[serde(default)]
    pub compatibility_notes: Option<String>,
}

impl AddOnOption {
    /// Eligibility for a (fuel, stage) query. `stage_name == None` is the
    /// engine-level query and admits only stage-unrestricted options.
    /// Stage names compare as stored: case-sensitive, no normalization.
    pub fn applies_to(&self, fuel: FuelType, stage_name: Option<&str>) -> bool {
        let fuel_ok = self.universal || self.fuel_types.contains(&fuel);
        let stage_ok = match (self.stage_compatibility.as_deref(), stage_name) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(gate), Some(name)) => gate == name,
        };
        fuel_ok && stage_ok
    }
}

/// Subset of `options` eligible for the given fuel and stage. An empty
/// result is a valid outcome, not an error.
pub fn match_add_ons<'a>(
    options: &'a [AddOnOption],
    fuel: FuelType,
    stage_name: Option<&str>,
) -> Vec<&'a AddOnOption> {
    options
        .iter()
        .filter(|o| o.applies_to(fuel, stage_name))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn option(universal: bool, fuels: &[FuelType], stage: Option<&str>) -> AddOnOption {
        AddOnOption {
            id: "a1".to_string(),
            title: "Launch control".to_string(),
            price: None,
            universal,
            fuel_types: fuels.to_vec(),
            stage_compatibility: stage.map(str::to_string),
            description: None,
            gallery: vec![],
            installation_time: None,
            compatibility_notes: None,
        }
    }

    #[test]
    fn universal_ignores_fuel_membership() {
        let o = option(true, &[], None);
        for fuel in [
            FuelType::Diesel,
            FuelType::Petrol,
            FuelType::Hybrid,
            FuelType::Electric,
        ] {
            assert!(o.applies_to(fuel, None));
            assert!(o.applies_to(fuel, Some("Steg 1")));
        }
    }

    #[test]
    fn fuel_specific_requires_membership() {
        let o = option(false, &[FuelType::Diesel], None);
        assert!(o.applies_to(FuelType::Diesel, Some("Steg 1")));
        assert!(!o.applies_to(FuelType::Petrol, Some("Steg 1")));
    }

    #[test]
    fn stage_gate_excludes_other_stages_and_engine_level() {
        let o = option(true, &[], Some("Steg 2"));
        assert!(o.applies_to(FuelType::Petrol, Some("Steg 2")));
        assert!(!o.applies_to(FuelType::Petrol, Some("Steg 1")));
        assert!(!o.applies_to(FuelType::Petrol, None));
    }

    #[test]
    fn stage_names_compare_as_stored() {
        let o = option(true, &[], Some("Steg 1"));
        assert!(!o.applies_to(FuelType::Petrol, Some("steg 1")));
        assert!(!o.applies_to(FuelType::Petrol, Some("Steg  1")));
    }

    #[test]
    fn fuel_specific_but_stage_unrestricted_is_valid() {
        let o = option(false, &[FuelType::Diesel], None);
        assert!(o.applies_to(FuelType::Diesel, None));
        assert!(o.applies_to(FuelType::Diesel, Some("Steg 3")));
        assert!(!o.applies_to(FuelType::Electric, None));
    }

    #[test]
    fn matches_subset_in_input_order() {
        let options = vec![
            option(true, &[], None),
            option(false, &[FuelType::Petrol], Some("Steg 1")),
            option(false, &[FuelType::Diesel], None),
        ];
        let matched = match_add_ons(&options, FuelType::Petrol, Some("Steg 1"));
        assert_eq!(matched.len(), 2);
        assert!(matched[0].universal);
        assert_eq!(matched[1].stage_compatibility.as_deref(), Some("Steg 1"));

        let engine_level = match_add_ons(&options, FuelType::Petrol, None);
        assert_eq!(engine_level.len(), 1);

        assert!(match_add_ons(&options, FuelType::Electric, None).is_empty());
    }
}
