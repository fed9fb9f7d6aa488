use uuid::Uuid;

use crate::database::{PagePayload, PageRecord, VectorPoint};
use crate::{Result, RetrieverError};

/// Namespace for point ids. Changing it orphans every stored point.
const POINT_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_6a7e_0c4b_5d2a_9a55_3e8f_1b27_c904);

/// Stable id of a tenant's page.
///
/// Storing the same page twice targets the same point, so the second write
/// replaces the first.
#[inline]
pub fn point_id(tenant_id: &str, page_number: u32) -> String {
    let name = format!("{}:{}", tenant_id, page_number);
    Uuid::new_v5(&POINT_NAMESPACE, name.as_bytes()).to_string()
}

/// Pair embeddings with pages by index, tagging each with the tenant
#[inline]
pub fn build_points(
    vectors: Vec<Vec<f32>>,
    pages: &[PageRecord],
    tenant_id: &str,
) -> Result<Vec<VectorPoint>> {
    if vectors.len() != pages.len() {
        return Err(RetrieverError::InputMismatch {
            vectors: vectors.len(),
            pages: pages.len(),
        });
    }

    Ok(vectors
        .into_iter()
        .zip(pages)
        .map(|(vector, page)| VectorPoint {
            id: point_id(tenant_id, page.page_number),
            vector,
            payload: PagePayload {
                page_number: page.page_number,
                page_text: page.page_text.clone(),
                page_table: page.page_table.clone(),
                tenant_id: tenant_id.to_string(),
            },
        })
        .collect())
}
