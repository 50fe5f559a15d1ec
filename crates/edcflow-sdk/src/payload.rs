//! Request bodies for each management API variant.

use edcflow_core::asset::{ALLOWED_DEST_TYPES, ALLOWED_SOURCE_TYPES};
use edcflow_core::{
    ApiVariant, Asset, AssetSelector, ContractDefinition, DataAddress, DataPlaneDescriptor,
    PolicyTemplate, EDC_NAMESPACE, ODRL_CONTEXT, ODRL_NAMESPACE,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::negotiation::NegotiationRequest;
use crate::transfer::TransferRequest;

const EDC: &str = "edc:";
const PERMISSION_EDCTYPE: &str = "dataspaceconnector:permission";

/// The JSON-LD context shared by every namespaced and JSON-LD body.
pub fn context() -> Value {
    json!({
        "@vocab": EDC_NAMESPACE,
        "edc": EDC_NAMESPACE,
        "odrl": ODRL_NAMESPACE,
    })
}

/// Data plane registration. Identical across variants.
pub fn dataplane(descriptor: &DataPlaneDescriptor) -> Value {
    json!({
        "edctype": "dataspaceconnector:dataplaneinstance",
        "id": descriptor.id,
        "url": descriptor.transfer_url,
        "allowedSourceTypes": ALLOWED_SOURCE_TYPES,
        "allowedDestTypes": ALLOWED_DEST_TYPES,
        "properties": {
            "publicApiUrl": descriptor.public_api_url,
        },
    })
}

pub fn asset(variant: ApiVariant, asset: &Asset) -> Value {
    match variant {
        ApiVariant::Legacy => {
            let mut props = Map::new();
            if let Some(id) = &asset.id {
                props.insert("asset:prop:id".into(), json!(id));
            }
            props.insert("asset:prop:name".into(), json!(asset.name));
            props.insert("asset:prop:description".into(), json!(asset.description));
            props.insert("asset:prop:version".into(), json!(asset.version));
            props.insert("asset:prop:contenttype".into(), json!(asset.content_type));
            json!({
                "asset": { "properties": props },
                "dataAddress": { "properties": asset.data_address.properties() },
            })
        }
        ApiVariant::Namespaced => {
            let mut inner = Map::new();
            inner.insert("@type".into(), json!("edc:Asset"));
            insert_id(&mut inner, "@id", asset.id.as_deref());
            inner.insert(
                "edc:properties".into(),
                json!({
                    "edc:name": asset.name,
                    "edc:description": asset.description,
                    "edc:version": asset.version,
                    "edc:contenttype": asset.content_type,
                }),
            );
            json!({
                "@context": context(),
                "edc:asset": inner,
                "edc:dataAddress": namespaced_address(&asset.data_address),
            })
        }
        ApiVariant::JsonLd => {
            let mut body = Map::new();
            body.insert("@context".into(), context());
            insert_id(&mut body, "@id", asset.id.as_deref());
            body.insert(
                "properties".into(),
                json!({
                    "name": asset.name,
                    "contenttype": asset.content_type,
                    "description": asset.description,
                    "version": asset.version,
                }),
            );
            body.insert(
                "dataAddress".into(),
                Value::Object(asset.data_address.properties()),
            );
            Value::Object(body)
        }
    }
}

/// Policy definition. The JSON-LD variant expresses unrestricted use as an
/// empty rule set and does not name a target.
pub fn policy(variant: ApiVariant, id: Option<&str>, template: &PolicyTemplate) -> Value {
    let PolicyTemplate::UnrestrictedUse { target } = template;

    match variant {
        ApiVariant::Legacy => {
            let mut permission = Map::new();
            if let Some(target) = target {
                permission.insert("target".into(), json!(target));
            }
            permission.insert("action".into(), json!({ "type": "USE" }));
            permission.insert("edctype".into(), json!(PERMISSION_EDCTYPE));

            let mut body = Map::new();
            insert_id(&mut body, "id", id);
            body.insert(
                "policy".into(),
                json!({
                    "uid": Uuid::new_v4().to_string(),
                    "permissions": [permission],
                    "@type": { "@policytype": "set" },
                }),
            );
            Value::Object(body)
        }
        ApiVariant::Namespaced => {
            let mut permission = Map::new();
            if let Some(target) = target {
                permission.insert("odrl:target".into(), json!(target));
            }
            permission.insert("odrl:action".into(), json!({ "odrl:type": "USE" }));
            permission.insert("odrl:edctype".into(), json!(PERMISSION_EDCTYPE));

            let mut body = Map::new();
            body.insert("@context".into(), context());
            insert_id(&mut body, "@id", id);
            body.insert(
                "edc:policy".into(),
                json!({
                    "@context": ODRL_CONTEXT,
                    "odrl:permission": [permission],
                    "@type": "odrl:Set",
                }),
            );
            Value::Object(body)
        }
        ApiVariant::JsonLd => {
            let mut body = Map::new();
            body.insert("@context".into(), context());
            insert_id(&mut body, "@id", id);
            body.insert(
                "policy".into(),
                json!({
                    "@type": "set",
                    "odrl:permission": [],
                    "odrl:prohibition": [],
                    "odrl:obligation": [],
                }),
            );
            Value::Object(body)
        }
    }
}

pub fn contract_definition(variant: ApiVariant, definition: &ContractDefinition) -> Value {
    let mut body = Map::new();

    match variant {
        ApiVariant::Legacy => {
            insert_id(&mut body, "id", definition.id.as_deref());
            body.insert("accessPolicyId".into(), json!(definition.access_policy_id));
            body.insert(
                "contractPolicyId".into(),
                json!(definition.contract_policy_id),
            );
            body.insert(
                "criteria".into(),
                criteria(&definition.selector, "", "asset:prop:id"),
            );
        }
        ApiVariant::Namespaced => {
            body.insert("@context".into(), context());
            body.insert("@type".into(), json!("edc:ContractDefinition"));
            insert_id(&mut body, "@id", definition.id.as_deref());
            body.insert(
                "edc:accessPolicyId".into(),
                json!(definition.access_policy_id),
            );
            body.insert(
                "edc:contractPolicyId".into(),
                json!(definition.contract_policy_id),
            );
            body.insert(
                "edc:assetsSelector".into(),
                criteria(&definition.selector, EDC, &format!("{EDC_NAMESPACE}id")),
            );
        }
        ApiVariant::JsonLd => {
            body.insert("@context".into(), context());
            insert_id(&mut body, "@id", definition.id.as_deref());
            body.insert("accessPolicyId".into(), json!(definition.access_policy_id));
            body.insert(
                "contractPolicyId".into(),
                json!(definition.contract_policy_id),
            );
            body.insert(
                "assetsSelector".into(),
                criteria(&definition.selector, "", &format!("{EDC_NAMESPACE}id")),
            );
        }
    }

    Value::Object(body)
}

pub fn catalog_request(variant: ApiVariant, provider_url: &str) -> Value {
    match variant {
        ApiVariant::Legacy => json!({ "providerUrl": provider_url }),
        ApiVariant::Namespaced => json!({
            "@context": context(),
            "edc:providerUrl": provider_url,
            "edc:protocol": variant.exchange_protocol(),
        }),
        ApiVariant::JsonLd => json!({
            "@context": context(),
            "counterPartyAddress": provider_url,
            "protocol": variant.exchange_protocol(),
        }),
    }
}

pub fn negotiation(variant: ApiVariant, request: &NegotiationRequest) -> Value {
    let offer = &request.offer;

    match variant {
        ApiVariant::Legacy => json!({
            "connectorId": request.connector_id,
            "connectorAddress": request.counter_party_address,
            "protocol": variant.exchange_protocol(),
            "offer": {
                "offerId": offer.offer_id,
                "assetId": offer.asset_id,
                "policy": offer.policy,
            },
        }),
        ApiVariant::Namespaced => json!({
            "@context": context(),
            "@type": "edc:NegotiationInitiateRequestDto",
            "edc:connectorId": request.connector_id,
            "edc:consumerId": request.consumer_id,
            "edc:providerId": request.provider_id,
            "edc:connectorAddress": request.counter_party_address,
            "edc:protocol": variant.exchange_protocol(),
            "edc:offer": {
                "@type": "edc:ContractOfferDescription",
                "edc:offerId": offer.offer_id,
                "edc:assetId": offer.asset_id,
                "edc:policy": offer.policy,
            },
        }),
        ApiVariant::JsonLd => json!({
            "@context": context(),
            "@type": "NegotiationInitiateRequestDto",
            "connectorId": request.connector_id,
            "consumerId": request.consumer_id,
            "providerId": request.provider_id,
            "counterPartyAddress": request.counter_party_address,
            "protocol": variant.exchange_protocol(),
            "policy": {
                "@context": ODRL_CONTEXT,
                "@type": "Set",
                "@id": offer.offer_id,
                "permission": offered_rules(&offer.policy, "permission"),
                "prohibition": offered_rules(&offer.policy, "prohibition"),
                "obligation": offered_rules(&offer.policy, "obligation"),
                "target": offer.asset_id,
            },
        }),
    }
}

pub fn transfer(variant: ApiVariant, request: &TransferRequest) -> Value {
    match variant {
        ApiVariant::Legacy => json!({
            "connectorId": request.connector_id,
            "connectorAddress": request.counter_party_address,
            "contractId": request.agreement_id,
            "assetId": request.asset_id,
            "managedResources": request.managed_resources.to_string(),
            "dataDestination": request.destination.properties(),
        }),
        ApiVariant::Namespaced => json!({
            "@context": context(),
            "@type": "edc:TransferRequestDto",
            "edc:connectorId": request.connector_id,
            "edc:connectorAddress": request.counter_party_address,
            "edc:contractId": request.agreement_id,
            "edc:assetId": request.asset_id,
            "edc:managedResources": request.managed_resources,
            "edc:protocol": variant.exchange_protocol(),
            "edc:dataDestination": namespaced_address(&request.destination),
        }),
        ApiVariant::JsonLd => {
            let mut body = Map::new();
            body.insert("@context".into(), context());
            body.insert("@type".into(), json!("TransferRequestDto"));
            body.insert("connectorId".into(), json!(request.connector_id));
            body.insert(
                "counterPartyAddress".into(),
                json!(request.counter_party_address),
            );
            body.insert("contractId".into(), json!(request.agreement_id));
            body.insert("assetId".into(), json!(request.asset_id));
            body.insert("protocol".into(), json!(variant.exchange_protocol()));
            if request.managed_resources {
                body.insert("managedResources".into(), json!(true));
            }
            body.insert(
                "dataDestination".into(),
                Value::Object(request.destination.properties()),
            );
            Value::Object(body)
        }
    }
}

fn insert_id(body: &mut Map<String, Value>, key: &str, id: Option<&str>) {
    if let Some(id) = id {
        body.insert(key.to_string(), json!(id));
    }
}

fn namespaced_address(address: &DataAddress) -> Value {
    json!({
        "@type": "edc:DataAddress",
        "edc:properties": address.prefixed_properties(EDC),
    })
}

fn criteria(selector: &AssetSelector, prefix: &str, operand_left: &str) -> Value {
    match selector {
        AssetSelector::All => json!([]),
        AssetSelector::AssetId(id) => {
            let mut criterion = Map::new();
            criterion.insert(format!("{prefix}operandLeft"), json!(operand_left));
            criterion.insert(format!("{prefix}operator"), json!("="));
            criterion.insert(format!("{prefix}operandRight"), json!(id));
            json!([criterion])
        }
    }
}

/// Rules of one kind from an offered policy, as a list.
fn offered_rules(policy: &Value, kind: &str) -> Value {
    let rules = policy
        .get(format!("odrl:{kind}"))
        .or_else(|| policy.get(kind));

    match rules {
        Some(Value::Array(items)) => Value::Array(items.clone()),
        Some(Value::Null) | None => json!([]),
        Some(single) => json!([single]),
    }
}
