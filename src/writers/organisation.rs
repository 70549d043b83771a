// src/writers/organisation.rs
use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::upsert::upsert;
use crate::canonical::canonical_organisation_name;
use crate::models::core::{into_record, Collection};
use crate::storage::Warehouse;
use crate::utils::helpers::{clean_string, slugify_string};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganisationInput {
    pub name: Option<String>,
}

/// Writes an organisation under its canonical cluster name.
pub async fn write_organisation(
    warehouse: &dyn Warehouse,
    organisation: &OrganisationInput,
    source_id: &str,
) -> Result<Option<String>> {
    let name = clean_string(organisation.name.as_deref());
    if name.chars().count() <= 1 {
        return Ok(None);
    }
    let canonical = canonical_organisation_name(warehouse, &name).await?;

    let record = into_record(json!({
        "slug": slugify_string(&canonical),
        "name": canonical,
        "source_id": source_id,
    }));
    let (id, created) = upsert(warehouse, Collection::Organisations, &["slug"], record).await?;
    debug!(
        "Organisation - {}: {}",
        if created { "created" } else { "updated" },
        canonical
    );
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalMapping;
    use crate::storage::MemoryWarehouse;

    async fn warehouse_with_clusters() -> MemoryWarehouse {
        let warehouse = MemoryWarehouse::with_natural_keys();
        for (canonical, variations) in [
            ("Ghent University Hospital", vec!["Ghent University Hospital", "Ghent University"]),
            (
                "Justus Liebig University of Giessen",
                vec!["Justus Liebig University of Giessen", "Justus Liebig"],
            ),
        ] {
            let mapping = CanonicalMapping::new(
                canonical,
                variations.into_iter().map(str::to_string).collect(),
            );
            warehouse
                .insert(Collection::OrganisationClusters, mapping.to_record())
                .await
                .unwrap();
        }
        warehouse
    }

    fn input(name: &str) -> OrganisationInput {
        OrganisationInput {
            name: Some(name.to_string()),
        }
    }

    #[tokio::test]
    async fn test_variants_share_one_row() {
        let warehouse = warehouse_with_clusters().await;
        let a = write_organisation(&warehouse, &input("Justus Liebig"), "ictrp").await.unwrap();
        let b = write_organisation(&warehouse, &input("Justus Liebig University of Giessen."), "nct")
            .await
            .unwrap();
        assert!(a.is_some());
        assert_eq!(a, b);
        let rows = warehouse.rows(Collection::Organisations).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Justus Liebig University of Giessen");
    }

    #[tokio::test]
    async fn test_unclustered_name_is_written_as_is() {
        let warehouse = warehouse_with_clusters().await;
        write_organisation(&warehouse, &input("\"Acme Labs\""), "nct").await.unwrap();
        let rows = warehouse.rows(Collection::Organisations).await;
        assert_eq!(rows[0]["name"], "Acme Labs");
        assert_eq!(rows[0]["slug"], "acme_labs");
    }

    #[tokio::test]
    async fn test_too_short_name_is_skipped() {
        let warehouse = warehouse_with_clusters().await;
        assert_eq!(write_organisation(&warehouse, &input("."), "nct").await.unwrap(), None);
        assert_eq!(
            write_organisation(&warehouse, &OrganisationInput::default(), "nct").await.unwrap(),
            None
        );
    }
}
