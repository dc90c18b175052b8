use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CURRENCIES_JSON: &str = include_str!("currencies.json");
const LOCATIONS_JSON: &str = include_str!("locations.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    pub name: String,
    pub code: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    pub id: i64,
    pub name: String,
    pub states: Vec<State>,
}

/// Currency list and country/state tree, embedded at build time and parsed
/// once at startup. Ids are stable: geography links on listings reference
/// them, so entries may be added but never renumbered.
#[derive(Debug)]
pub struct ReferenceData {
    currencies: Vec<Currency>,
    countries: Vec<Country>,
    state_index: HashMap<i64, (i64, String)>,
}

impl ReferenceData {
    pub fn load() -> Result<Self> {
        let currencies: Vec<Currency> = serde_json::from_str(CURRENCIES_JSON)?;
        let countries: Vec<Country> = serde_json::from_str(LOCATIONS_JSON)?;

        let mut state_index = HashMap::new();
        for country in &countries {
            for state in &country.states {
                state_index.insert(state.id, (country.id, state.name.clone()));
            }
        }

        Ok(Self {
            currencies,
            countries,
            state_index,
        })
    }

    pub fn currencies(&self) -> &[Currency] {
        &self.currencies
    }

    pub fn has_currency(&self, code: &str) -> bool {
        self.currencies.iter().any(|c| c.code == code)
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn country_exists(&self, id: i64) -> bool {
        self.countries.iter().any(|c| c.id == id)
    }

    pub fn country_name(&self, id: i64) -> Option<&str> {
        self.countries
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    pub fn state_name(&self, id: i64) -> Option<&str> {
        self.state_index.get(&id).map(|(_, name)| name.as_str())
    }

    pub fn state_belongs_to(&self, state_id: i64, country_id: i64) -> bool {
        self.state_index
            .get(&state_id)
            .map(|(parent, _)| *parent == country_id)
            .unwrap_or(false)
    }

    pub fn states_of(&self, country_id: i64) -> &[State] {
        self.countries
            .iter()
            .find(|c| c.id == country_id)
            .map(|c| c.states.as_slice())
            .unwrap_or(&[])
    }
}
