//! Macro-generated test suite for `Repository<Article, S>` contract validation.
//!
//! The `repository_tests!` macro generates a test module that runs the
//! repository against any `DocumentStore` implementation: writes and
//! read-back, single-record lookups, both listing modes, date rendering and
//! request cancellation.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use storage_harness::*;
//! use crud::storage::InMemoryStore;
//!
//! repository_tests!(InMemoryStore::for_entity::<Article>());
//! ```
//!
//! # Generated Tests
//!
//! ## Writes
//! - `test_insert_assigns_id_and_timestamps`: id set, created == updated
//! - `test_insert_keeps_caller_id`: a caller-supplied id is stored as is
//! - `test_insert_round_trips_nested_fields`: nested object and arrays survive
//! - `test_insert_skips_zero_fields`: zero values are never written
//! - `test_update_changes_fields_and_stamp`: patch applied, updated > created
//! - `test_update_keeps_unspecified_fields`: zero fields in a patch are ignored
//! - `test_update_missing_record`: returns `None`
//! - `test_update_grows_nested_array`: extra array elements in a patch are written
//! - `test_delete_removes_record` / `test_delete_missing_record`
//! - `test_archive_keeps_record_visible` / `test_restore_clears_archive`
//!
//! ## Lookups
//! - `test_get_by_id_and_template`, `test_get_missing_record`
//! - `test_exists_and_count`
//!
//! ## Listings
//! - page sizes for a fixed data set, empty collection, default and explicit
//!   sort, search, id allow-list, entity template, query and pipeline hooks,
//!   date rendering, simple mode parity
//!
//! ## Request context
//! - `test_cancelled_context`, `test_expired_deadline`
//! - `test_concurrent_inserts`

/// Generate a full `Repository<Article, S>` conformance test suite.
///
/// `$factory` must be an expression that evaluates to a fresh, empty store
/// implementing `DocumentStore + Clone + 'static`. It is re-evaluated for
/// each test to ensure isolation.
#[macro_export]
macro_rules! repository_tests {
    ($factory:expr) => {
        mod repository_contract_tests {
            use super::*;
            use crud::prelude::*;
            use std::time::Duration;
            use tokio_test::{assert_err, assert_ok};

            async fn seeded<S: DocumentStore>(
                repo: &Repository<Article, S>,
                ctx: &RequestContext,
                count: usize,
            ) -> Vec<Article> {
                let mut created = Vec::with_capacity(count);
                for item in sample_batch(count) {
                    created.push(repo.insert(ctx, item).await.unwrap());
                    tick().await;
                }
                created
            }

            fn titles(page: &Page<Article>) -> Vec<&str> {
                page.data.iter().map(|a| a.title.as_str()).collect()
            }

            // ==================================================================
            // Writes
            // ==================================================================

            #[tokio::test]
            async fn test_insert_assigns_id_and_timestamps() {
                init_tracing();
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let created = repo.insert(&ctx, article("a", 1)).await.unwrap();

                assert!(!created.id.is_empty(), "an identifier is generated");
                assert_eq!(created.title, "a");
                assert!(created.created_at.is_some());
                assert_eq!(created.created_at, created.updated_at);
                assert!(created.deleted_at.is_none());
                assert!(!created.is_deleted);
            }

            #[tokio::test]
            async fn test_insert_keeps_caller_id() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let mut item = article("a", 1);
                item.id = "custom-id".to_string();
                let created = repo.insert(&ctx, item).await.unwrap();

                assert_eq!(created.id, "custom-id");
                let fetched = repo.get_by_id(&ctx, "custom-id").await.unwrap();
                assert_eq!(fetched.map(|a| a.title), Some("a".to_string()));
            }

            #[tokio::test]
            async fn test_insert_round_trips_nested_fields() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let created = repo.insert(&ctx, rich_article()).await.unwrap();
                let expected = Article {
                    id: created.id.clone(),
                    created_at: created.created_at.clone(),
                    updated_at: created.updated_at.clone(),
                    ..rich_article()
                };
                assert_eq!(created, expected);

                let fetched = repo.get_by_id(&ctx, &created.id).await.unwrap();
                assert_eq!(fetched, Some(expected));
            }

            #[tokio::test]
            async fn test_insert_skips_zero_fields() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let mut item = article("sparse", 0);
                item.author.name = "Ada".to_string();
                let created = repo.insert(&ctx, item).await.unwrap();

                let raw = repo
                    .store()
                    .find_one(doc! { "id": created.id.as_str() })
                    .await
                    .unwrap()
                    .expect("record stored");
                assert!(!raw.contains_key("views"));
                assert!(!raw.contains_key("body"));
                assert!(!raw.contains_key("published"));
                assert!(!raw.contains_key("tags"));
                assert!(!raw.contains_key("isDeleted"));
                assert_eq!(raw.get_document("author").unwrap(), &doc! { "name": "Ada" });
                assert!(matches!(raw.get("createdAt"), Some(Bson::DateTime(_))));
            }

            #[tokio::test]
            async fn test_update_changes_fields_and_stamp() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let created = repo.insert(&ctx, article("a", 1)).await.unwrap();
                tick().await;

                let updated = repo
                    .update(&ctx, &created.id, article("b", 0))
                    .await
                    .unwrap()
                    .expect("record exists");
                assert_eq!(updated.title, "b");

                let fetched = repo.get_by_id(&ctx, &created.id).await.unwrap().unwrap();
                assert_eq!(fetched.title, "b");
                assert_eq!(fetched.created_at, created.created_at);
                assert!(parse_stamp(&fetched.updated_at) > parse_stamp(&fetched.created_at));
            }

            #[tokio::test]
            async fn test_update_keeps_unspecified_fields() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let created = repo.insert(&ctx, rich_article()).await.unwrap();
                let patch = Article {
                    views: 500,
                    id: "ignored".to_string(),
                    ..Default::default()
                };
                let updated = repo.update(&ctx, &created.id, patch).await.unwrap().unwrap();

                assert_eq!(updated.id, created.id, "the identifier never changes");
                assert_eq!(updated.views, 500);
                assert_eq!(updated.title, created.title);
                assert_eq!(updated.author, created.author);
                assert_eq!(updated.tags, created.tags);
            }

            #[tokio::test]
            async fn test_update_grows_nested_array() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let created = repo.insert(&ctx, rich_article()).await.unwrap();
                let mut tags = created.tags.clone();
                tags.push(Tag {
                    label: "async".to_string(),
                    weight: 2,
                });
                let patch = Article {
                    tags: tags.clone(),
                    ..Default::default()
                };

                let updated = repo.update(&ctx, &created.id, patch).await.unwrap().unwrap();
                assert_eq!(updated.tags.len(), 3);
                assert_eq!(updated.tags, tags);
            }

            #[tokio::test]
            async fn test_update_missing_record() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let result = repo.update(&ctx, "nope", article("b", 1)).await.unwrap();
                assert!(result.is_none());
                assert_eq!(repo.count(&ctx, &Article::default()).await.unwrap(), 0);
            }

            #[tokio::test]
            async fn test_delete_removes_record() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let created = repo.insert(&ctx, article("a", 1)).await.unwrap();
                repo.insert(&ctx, article("b", 2)).await.unwrap();

                assert_ok!(repo.delete(&ctx, &created.id).await);
                assert!(repo.get_by_id(&ctx, &created.id).await.unwrap().is_none());
                assert_eq!(repo.count(&ctx, &Article::default()).await.unwrap(), 1);
            }

            #[tokio::test]
            async fn test_delete_missing_record() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                assert_ok!(repo.delete(&ctx, "nope").await);
            }

            #[tokio::test]
            async fn test_archive_keeps_record_visible() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let created = repo.insert(&ctx, article("a", 1)).await.unwrap();
                repo.archive(&ctx, &created.id).await.unwrap();

                let fetched = repo
                    .get_by_id(&ctx, &created.id)
                    .await
                    .unwrap()
                    .expect("archived records stay readable");
                assert!(fetched.is_deleted);
                assert!(is_canonical_stamp(fetched.deleted_at.as_deref().unwrap()));

                let page = repo.list(&ctx, ListOptions::new()).await.unwrap();
                assert_eq!(page.total, 1, "listings do not hide archived records");
            }

            #[tokio::test]
            async fn test_restore_clears_archive() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let created = repo.insert(&ctx, article("a", 1)).await.unwrap();
                repo.archive(&ctx, &created.id).await.unwrap();
                repo.restore(&ctx, &created.id).await.unwrap();

                let fetched = repo.get_by_id(&ctx, &created.id).await.unwrap().unwrap();
                assert!(!fetched.is_deleted);
                assert!(fetched.deleted_at.is_none());
            }

            // ==================================================================
            // Lookups
            // ==================================================================

            #[tokio::test]
            async fn test_get_by_id_and_template() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let first = repo.insert(&ctx, rich_article()).await.unwrap();
                repo.insert(&ctx, article("other", 3)).await.unwrap();

                let probe = Article {
                    id: first.id.clone(),
                    ..Default::default()
                };
                let by_id = repo.get(&ctx, &probe).await.unwrap();
                assert_eq!(by_id.map(|a| a.id), Some(first.id.clone()));

                let template = Article {
                    author: Author {
                        name: "Ada".to_string(),
                        ..Default::default()
                    },
                    ..Default::default()
                };
                let by_template = repo.get(&ctx, &template).await.unwrap();
                assert_eq!(by_template.map(|a| a.id), Some(first.id));
            }

            #[tokio::test]
            async fn test_get_missing_record() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                repo.insert(&ctx, article("a", 1)).await.unwrap();

                assert!(repo.get_by_id(&ctx, "nope").await.unwrap().is_none());
                assert!(repo.get(&ctx, &article("zzz", 0)).await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_exists_and_count() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                repo.insert(&ctx, article("a", 7)).await.unwrap();
                repo.insert(&ctx, article("b", 7)).await.unwrap();
                repo.insert(&ctx, article("c", 1)).await.unwrap();

                let seven = article("", 7);
                assert!(repo.exists(&ctx, &seven).await.unwrap());
                assert_eq!(repo.count(&ctx, &seven).await.unwrap(), 2);

                let missing = article("", 99);
                assert!(!repo.exists(&ctx, &missing).await.unwrap());
                assert_eq!(repo.count(&ctx, &missing).await.unwrap(), 0);

                assert_eq!(repo.count(&ctx, &Article::default()).await.unwrap(), 3);
            }

            // ==================================================================
            // Listings, facet mode
            // ==================================================================

            #[tokio::test]
            async fn test_list_page_sizes() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();
                seeded(&repo, &ctx, 7).await;

                for (limit, skip, expected) in [
                    (3, 0, 3),
                    (3, 3, 3),
                    (3, 6, 1),
                    (3, 7, 0),
                    (3, 20, 0),
                    (10, 0, 7),
                    (0, 2, 5),
                ] {
                    let options = ListOptions::new().with_limit(limit).with_skip(skip);
                    let page = repo.list(&ctx, options).await.unwrap();
                    assert_eq!(
                        page.data.len(),
                        expected,
                        "limit {} skip {}",
                        limit,
                        skip
                    );
                    assert_eq!(page.total, 7, "total is never capped by the page");
                }
            }

            #[tokio::test]
            async fn test_list_empty_collection() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                let page = repo
                    .list(&ctx, ListOptions::new().with_limit(10))
                    .await
                    .unwrap();
                assert!(page.data.is_empty());
                assert_eq!(page.total, 0);

                let filtered = repo
                    .list(&ctx, ListOptions::new().with_search("x", ["title"]))
                    .await
                    .unwrap();
                assert_eq!(filtered, Page::default());
            }

            #[tokio::test]
            async fn test_list_default_sort_newest_first() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();
                seeded(&repo, &ctx, 3).await;

                let page = repo.list(&ctx, ListOptions::new()).await.unwrap();
                assert_eq!(titles(&page), vec!["Article 2", "Article 1", "Article 0"]);
            }

            #[tokio::test]
            async fn test_list_honors_requested_sort() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();
                seeded(&repo, &ctx, 4).await;

                let options = ListOptions::new().with_sort("views", false).with_limit(2);
                let page = repo.list(&ctx, options).await.unwrap();
                assert_eq!(titles(&page), vec!["Article 0", "Article 1"]);
                assert_eq!(page.total, 4);
            }

            #[tokio::test]
            async fn test_list_search() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                repo.insert(&ctx, rich_article()).await.unwrap();
                repo.insert(&ctx, article("Rust news", 1)).await.unwrap();
                repo.insert(&ctx, article("Go news", 1)).await.unwrap();

                let search = |keyword: &str, fields: &[&str]| {
                    ListOptions::<Article>::new().with_search(keyword, fields.to_vec())
                };

                let page = repo.list(&ctx, search("NEWS", &["title"])).await.unwrap();
                assert_eq!(page.total, 2, "search is case-insensitive");

                let page = repo
                    .list(&ctx, search("ada", &["title", "author.name"]))
                    .await
                    .unwrap();
                assert_eq!(titles(&page), vec!["Ownership in practice"]);

                let page = repo.list(&ctx, search("", &["title"])).await.unwrap();
                assert_eq!(page.total, 3, "an empty keyword filters nothing");

                let page = repo.list(&ctx, search("news", &[])).await.unwrap();
                assert_eq!(page.total, 3, "no search fields filters nothing");
            }

            #[tokio::test]
            async fn test_list_search_is_literal() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                repo.insert(&ctx, article("a+b", 1)).await.unwrap();
                repo.insert(&ctx, article("aab", 1)).await.unwrap();

                let page = repo
                    .list(&ctx, ListOptions::new().with_search("a+b", ["title"]))
                    .await
                    .unwrap();
                assert_eq!(titles(&page), vec!["a+b"]);
            }

            #[tokio::test]
            async fn test_list_ids_filter() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();
                let created = seeded(&repo, &ctx, 4).await;

                let wanted = [created[0].id.clone(), created[2].id.clone()];
                let page = repo
                    .list(&ctx, ListOptions::new().with_ids(wanted.clone()))
                    .await
                    .unwrap();
                assert_eq!(page.total, 2);
                assert!(page.data.iter().all(|a| wanted.contains(&a.id)));

                let no_ids: Vec<String> = Vec::new();
                let page = repo
                    .list(&ctx, ListOptions::new().with_ids(no_ids))
                    .await
                    .unwrap();
                assert_eq!(page.total, 4, "an empty id list filters nothing");
            }

            #[tokio::test]
            async fn test_list_template_filter() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();

                repo.insert(&ctx, rich_article()).await.unwrap();
                repo.insert(&ctx, article("plain", 120)).await.unwrap();
                repo.insert(&ctx, article("other", 3)).await.unwrap();

                let by_views = ListOptions::new().with_filter(article("", 120));
                assert_eq!(repo.list(&ctx, by_views).await.unwrap().total, 2);

                let nested = Article {
                    tags: vec![Tag {
                        label: "rust".to_string(),
                        ..Default::default()
                    }],
                    ..Default::default()
                };
                let page = repo
                    .list(&ctx, ListOptions::new().with_filter(nested))
                    .await
                    .unwrap();
                assert_eq!(titles(&page), vec!["Ownership in practice"]);
            }

            #[tokio::test]
            async fn test_list_query_hook_excludes_archived() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();
                let created = seeded(&repo, &ctx, 3).await;
                repo.archive(&ctx, &created[1].id).await.unwrap();

                let options = ListOptions::new().with_custom_query(|q| {
                    q.ne("isDeleted", true);
                });
                let page = repo.list(&ctx, options).await.unwrap();
                assert_eq!(page.total, 2);
                assert!(page.data.iter().all(|a| !a.is_deleted));
            }

            #[tokio::test]
            async fn test_list_pipeline_hook() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();
                seeded(&repo, &ctx, 6).await;

                let options = ListOptions::new()
                    .with_limit(2)
                    .with_search("article", ["title"])
                    .with_custom_pipeline(|mut stages| {
                        stages.push(doc! { "$match": { "views": { "$gt": 3 } } });
                        stages
                    });
                let page = repo.list(&ctx, options).await.unwrap();

                assert_eq!(page.total, 3, "the hook narrows the counted set too");
                assert_eq!(titles(&page), vec!["Article 5", "Article 4"]);
            }

            #[tokio::test]
            async fn test_list_renders_dates() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();
                let created = seeded(&repo, &ctx, 3).await;
                repo.archive(&ctx, &created[0].id).await.unwrap();

                let page = repo.list(&ctx, ListOptions::new()).await.unwrap();
                assert_eq!(page.data.len(), 3);
                for item in &page.data {
                    assert!(is_canonical_stamp(item.created_at.as_deref().unwrap()));
                    assert!(is_canonical_stamp(item.updated_at.as_deref().unwrap()));
                    if item.id == created[0].id {
                        assert!(is_canonical_stamp(item.deleted_at.as_deref().unwrap()));
                    } else {
                        assert!(item.deleted_at.is_none(), "no deletion stamp is invented");
                    }
                }
            }

            // ==================================================================
            // Listings, simple mode
            // ==================================================================

            #[tokio::test]
            async fn test_find_many_matches_list() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();
                seeded(&repo, &ctx, 5).await;

                let options = || {
                    ListOptions::<Article>::new()
                        .with_limit(2)
                        .with_skip(1)
                        .with_sort("views", true)
                };
                let simple = repo.find_many(&ctx, options()).await.unwrap();
                let facet = repo.list(&ctx, options()).await.unwrap();

                assert_eq!(simple.total, 5);
                assert_eq!(titles(&simple), vec!["Article 3", "Article 2"]);
                assert_eq!(simple, facet);
            }

            #[tokio::test]
            async fn test_find_many_filters_and_renders_dates() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();
                seeded(&repo, &ctx, 4).await;

                let options = ListOptions::new()
                    .with_search("article 1", ["title"])
                    .with_custom_query(|q| {
                        q.gte("views", 1);
                    });
                let page = repo.find_many(&ctx, options).await.unwrap();

                assert_eq!(page.total, 1);
                assert_eq!(titles(&page), vec!["Article 1"]);
                assert!(is_canonical_stamp(page.data[0].created_at.as_deref().unwrap()));
            }

            // ==================================================================
            // Request context
            // ==================================================================

            #[tokio::test]
            async fn test_cancelled_context() {
                let repo = Repository::<Article, _>::new($factory);
                let ctx = RequestContext::new();
                repo.insert(&ctx, article("a", 1)).await.unwrap();

                let cancelled = RequestContext::new();
                cancelled.cancel();

                let err = assert_err!(repo.list(&cancelled, ListOptions::new()).await);
                assert!(matches!(err, CrudError::Cancelled));
                let err = assert_err!(repo.insert(&cancelled, article("b", 1)).await);
                assert!(err.is_cancellation());

                assert_eq!(repo.count(&ctx, &Article::default()).await.unwrap(), 1);
            }

            #[tokio::test]
            async fn test_expired_deadline() {
                let repo = Repository::<Article, _>::new($factory);
                let expired = RequestContext::with_timeout(Duration::ZERO);

                let err = assert_err!(repo.get_by_id(&expired, "x").await);
                assert!(matches!(err, CrudError::DeadlineExceeded));
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
            async fn test_concurrent_inserts() {
                let repo = Repository::<Article, _>::new($factory);
                let r1 = repo.clone();
                let r2 = repo.clone();

                let h1 = tokio::spawn(async move {
                    r1.insert(&RequestContext::new(), article("A", 1)).await
                });
                let h2 = tokio::spawn(async move {
                    r2.insert(&RequestContext::new(), article("B", 2)).await
                });

                let (a, b) = tokio::time::timeout(Duration::from_secs(30), async {
                    tokio::try_join!(h1, h2).unwrap()
                })
                .await
                .expect("concurrent inserts timed out");
                let (a, b) = (a.unwrap(), b.unwrap());
                assert_ne!(a.id, b.id);

                let page = repo.list(&RequestContext::new(), ListOptions::new()).await.unwrap();
                assert_eq!(page.total, 2);
            }
        }
    };
}
