//! Category pagination.
//!
//! Oversized category listings split into shards of 200 subcategories.
//! Shard 0 keeps the original article id; shard `i` is suffixed `__i`.
//! Shards reference their neighbours by id only and are always dereferenced
//! through the store.

use crate::utils::constants::CATEGORY_PAGE_SIZE;
use crate::wiki_client::types::ArticleDetail;

/// Split `detail` into pagination shards. A listing at or under the page
/// size stays a single shard with the original id.
#[must_use]
pub fn paginate(article_id: &str, detail: &ArticleDetail) -> Vec<(String, ArticleDetail)> {
    let total = detail.sub_categories.len();
    if total <= CATEGORY_PAGE_SIZE {
        return vec![(article_id.to_string(), detail.clone())];
    }

    let shard_count = total.div_ceil(CATEGORY_PAGE_SIZE);
    let shard_id = |index: usize| {
        if index == 0 {
            article_id.to_string()
        } else {
            format!("{article_id}__{index}")
        }
    };

    (0..shard_count)
        .map(|index| {
            let start = index * CATEGORY_PAGE_SIZE;
            let end = (start + CATEGORY_PAGE_SIZE).min(total);
            let mut shard = detail.clone();
            shard.sub_categories = detail.sub_categories[start..end].to_vec();
            if index > 0 {
                shard.pages = Vec::new();
            }
            shard.prev_article_id = (index > 0).then(|| shard_id(index - 1));
            shard.next_article_id = (index + 1 < shard_count).then(|| shard_id(index + 1));
            (shard_id(index), shard)
        })
        .collect()
}
