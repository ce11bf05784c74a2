// src/services/pagination.rs

//! Page-of-threads pagination. Only roots are counted and sliced; every root
//! on a page keeps its whole reply subtree.

use crate::{
    error::{CommentError, Result},
    models::comment::{Comment, CommentListResponse},
};

/// A validated `(page, page_size)` pair. `page` is 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    page_size: usize,
}

impl PageRequest {
    /// Fails with [`CommentError::InvalidArgument`] when either value is below 1.
    pub fn new(page: i64, page_size: i64) -> Result<Self> {
        if page < 1 {
            return Err(CommentError::InvalidArgument(format!(
                "page must be >= 1, got {}",
                page
            )));
        }
        if page_size < 1 {
            return Err(CommentError::InvalidArgument(format!(
                "page_size must be >= 1, got {}",
                page_size
            )));
        }

        let to_usize = |v: i64| {
            usize::try_from(v)
                .map_err(|_| CommentError::InvalidArgument(format!("value {} is too large", v)))
        };

        Ok(Self {
            page: to_usize(page)?,
            page_size: to_usize(page_size)?,
        })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of roots that precede this page.
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// One page of items plus the totals describing the full set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// `ceil(total / page_size)`; zero when there is nothing to page.
pub fn total_pages(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size)
}

/// Selects the roots for `request`. A page past the end is empty, not an error.
pub fn paginate<T>(roots: Vec<T>, request: PageRequest) -> Page<T> {
    let total = roots.len();
    let items = roots
        .into_iter()
        .skip(request.offset())
        .take(request.page_size)
        .collect();

    Page {
        items,
        total,
        page: request.page,
        page_size: request.page_size,
        total_pages: total_pages(total, request.page_size),
    }
}

impl From<Page<Comment>> for CommentListResponse {
    fn from(page: Page<Comment>) -> Self {
        CommentListResponse {
            comments: page.items,
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::comment::CommentRecord;
    use crate::services::thread::assemble;
    use chrono::{Duration, TimeZone, Utc};

    fn req(page: i64, size: i64) -> PageRequest {
        PageRequest::new(page, size).unwrap()
    }

    #[test]
    fn rejects_non_positive_arguments() {
        for (page, size) in [(0, 10), (-1, 10), (1, 0), (1, -5)] {
            assert!(matches!(
                PageRequest::new(page, size),
                Err(CommentError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn total_pages_is_ceiling_division() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(7, 1), 7);
    }

    #[test]
    fn slices_the_requested_page() {
        let roots: Vec<u32> = (1..=7).collect();

        let first = paginate(roots.clone(), req(1, 3));
        assert_eq!(first.items, vec![1, 2, 3]);
        assert_eq!(first.total, 7);
        assert_eq!(first.total_pages, 3);

        let last = paginate(roots, req(3, 3));
        assert_eq!(last.items, vec![7]);
        assert_eq!(last.page, 3);
    }

    #[test]
    fn page_past_the_end_is_empty_with_totals() {
        let page = paginate((1..=4).collect::<Vec<u32>>(), req(9, 2));
        assert!(page.items.is_empty());
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn empty_set_accepts_any_positive_page() {
        for p in [1, 2, 50] {
            let page = paginate(Vec::<u32>::new(), req(p, 10));
            assert!(page.items.is_empty());
            assert_eq!(page.total, 0);
            assert_eq!(page.total_pages, 0);
        }
    }

    #[test]
    fn huge_page_number_does_not_overflow() {
        let page = paginate(vec![1u32, 2, 3], req(i64::MAX, i64::MAX));
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn roots_keep_their_whole_subtree_at_any_page_size() {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut records = Vec::new();
        for r in 0..5 {
            let root_id = format!("r{}", r);
            let t = base + Duration::minutes(r * 10);
            records.push(CommentRecord {
                id: root_id.clone(),
                article_id: "a1".into(),
                user_id: "u".into(),
                parent_id: None::<String>.into(),
                content: "root".into(),
                created_at: t,
                updated_at: t,
                deleted_at: None,
            });
            for c in 0..r {
                let t = t + Duration::seconds(c + 1);
                records.push(CommentRecord {
                    id: format!("{}-{}", root_id, c),
                    article_id: "a1".into(),
                    user_id: "u".into(),
                    parent_id: Some(root_id.clone()).into(),
                    content: "reply".into(),
                    created_at: t,
                    updated_at: t,
                    deleted_at: None,
                });
            }
        }
        let forest = assemble(records).unwrap();

        for size in 1..=6 {
            let mut page_no = 1;
            loop {
                let page = paginate(forest.roots.clone(), req(page_no, size));
                if page.items.is_empty() {
                    break;
                }
                for root in &page.items {
                    let r: usize = root.id[1..].parse().unwrap();
                    assert_eq!(root.subtree_len(), r + 1);
                }
                page_no += 1;
            }
            assert_eq!(page_no as usize - 1, total_pages(5, size as usize));
        }
    }
}
