//! Reading offers out of catalog responses.
//!
//! A catalog holding one dataset is returned as a bare object, several
//! datasets as a list. Both shapes normalise to a list, and selection is
//! always the first entry.

use edcflow_core::{ApiVariant, CatalogOffer, EdcError, Result};
use serde_json::Value;

/// Normalise a single object or a list into a list.
pub fn one_or_many(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

/// Parse every offered dataset in a catalog response.
pub fn offers_from_response(
    variant: ApiVariant,
    endpoint: &str,
    body: &Value,
) -> Result<Vec<CatalogOffer>> {
    let key = variant.catalog_key();
    let datasets = body.get(key).ok_or_else(|| {
        EdcError::protocol(endpoint, format!("catalog response has no {key:?} field"))
    })?;

    one_or_many(datasets)
        .into_iter()
        .map(|dataset| parse_offer(variant, endpoint, dataset))
        .collect()
}

/// The first offer, deterministically.
pub fn select_first(offers: Vec<CatalogOffer>, endpoint: &str) -> Result<CatalogOffer> {
    offers
        .into_iter()
        .next()
        .ok_or_else(|| EdcError::protocol(endpoint, "catalog offers no datasets"))
}

fn parse_offer(variant: ApiVariant, endpoint: &str, dataset: &Value) -> Result<CatalogOffer> {
    match variant {
        ApiVariant::Legacy => Ok(CatalogOffer {
            offer_id: required_str(dataset, &["id"], endpoint)?,
            asset_id: required_str(dataset, &["assetId"], endpoint)?,
            policy: dataset.get("policy").cloned().unwrap_or(Value::Null),
        }),
        ApiVariant::Namespaced | ApiVariant::JsonLd => {
            let policies = dataset
                .get("odrl:hasPolicy")
                .ok_or_else(|| EdcError::protocol(endpoint, "dataset has no odrl:hasPolicy"))?;
            let policy = one_or_many(policies)
                .into_iter()
                .next()
                .cloned()
                .ok_or_else(|| EdcError::protocol(endpoint, "dataset offers no policy"))?;

            Ok(CatalogOffer {
                offer_id: required_str(&policy, &["@id"], endpoint)?,
                asset_id: required_str(dataset, &["edc:id", "id", "@id"], endpoint)?,
                policy,
            })
        }
    }
}

/// First string found under any of `keys`.
fn required_str(value: &Value, keys: &[&str], endpoint: &str) -> Result<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| {
            EdcError::protocol(endpoint, format!("missing string field, tried {keys:?}"))
        })
}
