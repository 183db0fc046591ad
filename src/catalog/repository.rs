// Repository pattern - style persistence
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension, Row, TransactionBehavior};
use std::sync::Arc;

use crate::catalog::domain::*;
use crate::db::{self, RepositoryError};
use crate::pagination::PageRequest;
use crate::state::DbPool;
use crate::taxonomy::{Difficulty, FaceShape, Occasion};

pub type StyleMutation = Box<dyn FnOnce(Style) -> Result<Style, CatalogError> + Send>;

#[async_trait]
pub trait StyleRepository: Send + Sync {
    /// `Conflict` when the slug is taken
    async fn insert(&self, style: &Style) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Style>, RepositoryError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Style>, RepositoryError>;

    async fn modify(&self, id: &str, mutation: StyleMutation) -> Result<Style, CatalogError>;

    /// Single-statement increment
    async fn increment_views(&self, id: &str) -> Result<(), RepositoryError>;

    /// Returns the new like count, `None` for an unknown style
    async fn adjust_likes(&self, id: &str, increment: bool) -> Result<Option<u32>, RepositoryError>;

    /// One sorted page plus the total match count
    async fn list(
        &self,
        filter: &StyleFilter,
        sort: StyleSort,
        page: &PageRequest,
    ) -> Result<(Vec<Style>, u64), RepositoryError>;

    /// Every style matching the structured filters (the free-text part is ignored)
    async fn find_matching(&self, filter: &StyleFilter) -> Result<Vec<Style>, RepositoryError>;

    /// Published styles with at least `min_likes`, most liked first
    async fn top_published(&self, min_likes: u32, limit: u32)
        -> Result<Vec<Style>, RepositoryError>;

    async fn suggestions(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<StyleSuggestion>, RepositoryError>;

    async fn filter_options(&self, tag_limit: u32) -> Result<FilterOptions, RepositoryError>;
}

const STYLE_COLUMNS: &str = "id, name, slug, image, additional_images_json, description, \
     difficulty, occasions_json, face_shapes_json, required_items_json, instructions_json, \
     tags_json, likes, views, created_by, status, created_at, updated_at";

fn parse_label<T: std::str::FromStr<Err = String>>(raw: String) -> rusqlite::Result<T> {
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
    })
}

fn style_from_row(row: &Row<'_>) -> rusqlite::Result<Style> {
    Ok(Style {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        image: row.get(3)?,
        additional_images: db::json_column(&row.get::<_, String>(4)?)?,
        description: row.get(5)?,
        difficulty: parse_label(row.get(6)?)?,
        occasions: db::json_column(&row.get::<_, String>(7)?)?,
        face_shapes: db::json_column(&row.get::<_, String>(8)?)?,
        required_items: db::json_column(&row.get::<_, String>(9)?)?,
        instructions: db::json_column(&row.get::<_, String>(10)?)?,
        tags: db::json_column(&row.get::<_, String>(11)?)?,
        likes: row.get(12)?,
        views: row.get(13)?,
        created_by: row.get(14)?,
        status: parse_label(row.get(15)?)?,
        created_at: db::parse_timestamp(&row.get::<_, String>(16)?)?,
        updated_at: db::parse_timestamp(&row.get::<_, String>(17)?)?,
    })
}

/// Content columns only; counters are written by their own statements.
fn write_style(conn: &rusqlite::Connection, style: &Style) -> Result<(), RepositoryError> {
    conn.execute(
        "UPDATE styles SET
            name = ?2, slug = ?3, image = ?4, additional_images_json = ?5, description = ?6,
            difficulty = ?7, occasions_json = ?8, face_shapes_json = ?9,
            required_items_json = ?10, instructions_json = ?11, tags_json = ?12,
            status = ?13, updated_at = ?14
         WHERE id = ?1",
        params![
            style.id,
            style.name,
            style.slug,
            style.image,
            serde_json::to_string(&style.additional_images)?,
            style.description,
            style.difficulty.as_str(),
            serde_json::to_string(&style.occasions)?,
            serde_json::to_string(&style.face_shapes)?,
            serde_json::to_string(&style.required_items)?,
            serde_json::to_string(&style.instructions)?,
            serde_json::to_string(&style.tags)?,
            style.status.as_str(),
            db::timestamp(style.updated_at),
        ],
    )
    .map_err(|e| RepositoryError::from_constraint(e, slug_conflict(&style.slug)))?;
    Ok(())
}

fn slug_conflict(slug: &str) -> String {
    format!("A style with the slug '{}' already exists", slug)
}

/// WHERE clause and its positional string parameters.
fn filter_clause(filter: &StyleFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(status) = filter.status {
        values.push(status.as_str().to_string());
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(difficulty) = filter.difficulty {
        values.push(difficulty.as_str().to_string());
        clauses.push(format!("difficulty = ?{}", values.len()));
    }
    if let Some(shape) = filter.face_shape {
        values.push(shape.as_str().to_string());
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM json_each(face_shapes_json) WHERE value = ?{})",
            values.len()
        ));
    }
    if !filter.occasions.is_empty() {
        let placeholders: Vec<String> = filter
            .occasions
            .iter()
            .map(|o| {
                values.push(o.as_str().to_string());
                format!("?{}", values.len())
            })
            .collect();
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM json_each(occasions_json) WHERE value IN ({}))",
            placeholders.join(", ")
        ));
    }
    if let Some(creator) = &filter.created_by {
        values.push(creator.clone());
        clauses.push(format!("created_by = ?{}", values.len()));
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, values)
}

fn order_clause(sort: StyleSort) -> &'static str {
    match sort {
        StyleSort::Newest => "ORDER BY created_at DESC, id DESC",
        StyleSort::Oldest => "ORDER BY created_at ASC, id ASC",
        StyleSort::Popular => "ORDER BY likes DESC, views DESC, created_at DESC",
        StyleSort::Name => "ORDER BY name COLLATE NOCASE ASC, id ASC",
        StyleSort::Difficulty => {
            "ORDER BY CASE difficulty WHEN 'Beginner' THEN 0 WHEN 'Intermediate' THEN 1 ELSE 2 END, \
             name COLLATE NOCASE ASC"
        }
    }
}

fn query_styles(
    conn: &rusqlite::Connection,
    sql: &str,
    values: &[String],
) -> Result<Vec<Style>, RepositoryError> {
    let mut stmt = conn.prepare(sql)?;
    let styles = stmt
        .query_map(params_from_iter(values.iter()), style_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(styles)
}

pub struct SqliteStyleRepository {
    pool: DbPool,
}

impl SqliteStyleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn distinct_labels<T: std::str::FromStr<Err = String>>(
        conn: &rusqlite::Connection,
        sql: &str,
    ) -> Result<Vec<T>, RepositoryError> {
        let mut stmt = conn.prepare(sql)?;
        let labels = stmt
            .query_map([], |row| parse_label(row.get(0)?))?
            .collect::<Result<Vec<T>, _>>()?;
        Ok(labels)
    }
}

#[async_trait]
impl StyleRepository for SqliteStyleRepository {
    async fn insert(&self, style: &Style) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO styles (id, name, slug, image, likes, views, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                style.id,
                style.name,
                style.slug,
                style.image,
                style.likes,
                style.views,
                style.created_by,
                db::timestamp(style.created_at),
                db::timestamp(style.updated_at),
            ],
        )
        .map_err(|e| RepositoryError::from_constraint(e, slug_conflict(&style.slug)))?;

        write_style(&tx, style)?;
        tx.commit()?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Style>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT {} FROM styles WHERE id = ?1", STYLE_COLUMNS);
        Ok(conn.query_row(&sql, params![id], style_from_row).optional()?)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Style>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT {} FROM styles WHERE slug = ?1", STYLE_COLUMNS);
        Ok(conn.query_row(&sql, params![slug], style_from_row).optional()?)
    }

    async fn modify(&self, id: &str, mutation: StyleMutation) -> Result<Style, CatalogError> {
        let mut conn = self.pool.get().map_err(RepositoryError::from)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        let sql = format!("SELECT {} FROM styles WHERE id = ?1", STYLE_COLUMNS);
        let current = tx
            .query_row(&sql, params![id], style_from_row)
            .optional()
            .map_err(RepositoryError::from)?
            .ok_or_else(|| CatalogError::NotFound("Hijab style".to_string()))?;

        let updated = mutation(current)?;
        write_style(&tx, &updated).map_err(|e| match e {
            RepositoryError::Conflict(msg) => CatalogError::Conflict(msg),
            other => other.into(),
        })?;

        tx.commit().map_err(RepositoryError::from)?;
        Ok(updated)
    }

    async fn increment_views(&self, id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE styles SET views = views + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    async fn adjust_likes(&self, id: &str, increment: bool) -> Result<Option<u32>, RepositoryError> {
        let conn = self.pool.get()?;
        let delta: i64 = if increment { 1 } else { -1 };

        let likes = conn
            .query_row(
                "UPDATE styles SET likes = MAX(0, likes + ?2), updated_at = ?3
                 WHERE id = ?1
                 RETURNING likes",
                params![id, delta, db::timestamp(Utc::now())],
                |row| row.get(0),
            )
            .optional()?;

        Ok(likes)
    }

    async fn list(
        &self,
        filter: &StyleFilter,
        sort: StyleSort,
        page: &PageRequest,
    ) -> Result<(Vec<Style>, u64), RepositoryError> {
        let conn = self.pool.get()?;
        let (clause, values) = filter_clause(filter);

        let total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM styles {}", clause),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM styles {} {} LIMIT {} OFFSET {}",
            STYLE_COLUMNS,
            clause,
            order_clause(sort),
            page.limit(),
            page.offset()
        );
        let styles = query_styles(&conn, &sql, &values)?;

        Ok((styles, total))
    }

    async fn find_matching(&self, filter: &StyleFilter) -> Result<Vec<Style>, RepositoryError> {
        let conn = self.pool.get()?;
        let (clause, values) = filter_clause(filter);
        let sql = format!(
            "SELECT {} FROM styles {} {}",
            STYLE_COLUMNS,
            clause,
            order_clause(StyleSort::Newest)
        );
        query_styles(&conn, &sql, &values)
    }

    async fn top_published(
        &self,
        min_likes: u32,
        limit: u32,
    ) -> Result<Vec<Style>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM styles
             WHERE status = 'Published' AND likes >= ?1
             {}
             LIMIT ?2",
            STYLE_COLUMNS,
            order_clause(StyleSort::Popular)
        );
        let mut stmt = conn.prepare(&sql)?;
        let styles = stmt
            .query_map(params![min_likes, limit], style_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(styles)
    }

    async fn suggestions(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<StyleSuggestion>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, slug FROM styles
             WHERE status = 'Published'
               AND (instr(lower(name), lower(?1)) > 0
                    OR EXISTS (SELECT 1 FROM json_each(tags_json)
                               WHERE instr(value, lower(?1)) > 0))
             ORDER BY likes DESC, name
             LIMIT ?2",
        )?;
        let suggestions = stmt
            .query_map(params![query, limit], |row| {
                Ok(StyleSuggestion {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(suggestions)
    }

    async fn filter_options(&self, tag_limit: u32) -> Result<FilterOptions, RepositoryError> {
        let conn = self.pool.get()?;

        let mut difficulties: Vec<Difficulty> = Self::distinct_labels(
            &conn,
            "SELECT DISTINCT difficulty FROM styles WHERE status = 'Published'",
        )?;
        difficulties.sort();

        let mut occasions: Vec<Occasion> = Self::distinct_labels(
            &conn,
            "SELECT DISTINCT j.value FROM styles s, json_each(s.occasions_json) j
             WHERE s.status = 'Published'",
        )?;
        occasions.sort();

        let mut face_shapes: Vec<FaceShape> = Self::distinct_labels(
            &conn,
            "SELECT DISTINCT j.value FROM styles s, json_each(s.face_shapes_json) j
             WHERE s.status = 'Published'",
        )?;
        face_shapes.sort();

        let mut stmt = conn.prepare(
            "SELECT DISTINCT j.value FROM styles s, json_each(s.tags_json) j
             WHERE s.status = 'Published' AND j.value != ''
             ORDER BY j.value
             LIMIT ?1",
        )?;
        let tags = stmt
            .query_map(params![tag_limit], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(FilterOptions {
            difficulties,
            occasions,
            face_shapes,
            tags,
        })
    }
}

pub type DynStyleRepository = Arc<dyn StyleRepository>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::StyleStatus;

    fn create_test_repo() -> (SqliteStyleRepository, tempfile::TempDir) {
        let (pool, tmp) = db::test_pool();
        (SqliteStyleRepository::new(pool), tmp)
    }

    fn new_style(id: &str, name: &str) -> Style {
        let draft = StyleDraft {
            name: name.to_string(),
            image: "https://cdn.example.com/s.jpg".to_string(),
            ..StyleDraft::default()
        };
        Style::create(id.to_string(), draft, None, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn failed_insert_leaves_no_partial_row() {
        let (repo, _tmp) = create_test_repo();
        repo.pool
            .get()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER block_style_update BEFORE UPDATE ON styles
                 BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
            )
            .unwrap();

        let style = new_style("s1", "Classic Wrap");
        assert!(repo.insert(&style).await.is_err());
        assert!(repo.find_by_id("s1").await.unwrap().is_none());
        assert!(repo.find_by_slug("classic-wrap").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let (repo, _tmp) = create_test_repo();
        let style = Style {
            occasions: vec![Occasion::Office],
            face_shapes: vec![FaceShape::Oval],
            tags: vec!["easy".into()],
            ..new_style("s1", "Classic Wrap")
        };
        repo.insert(&style).await.unwrap();

        let loaded = repo.find_by_slug("classic-wrap").await.unwrap().unwrap();
        assert_eq!(loaded.id, "s1");
        assert_eq!(loaded.occasions, vec![Occasion::Office]);
        assert_eq!(loaded.tags, vec!["easy"]);
    }

    #[tokio::test]
    async fn duplicate_slug_is_conflict() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&new_style("s1", "Classic Wrap")).await.unwrap();

        let result = repo.insert(&new_style("s2", "Classic  Wrap!")).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn rename_onto_existing_slug_is_conflict() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&new_style("s1", "Classic Wrap")).await.unwrap();
        repo.insert(&new_style("s2", "Turban")).await.unwrap();

        let result = repo
            .modify(
                "s2",
                Box::new(|s| {
                    s.apply(
                        StylePatch {
                            name: Some("Classic Wrap".into()),
                            ..StylePatch::default()
                        },
                        Utc::now(),
                    )
                }),
            )
            .await;
        assert!(matches!(result, Err(CatalogError::Conflict(_))));
        assert_eq!(repo.find_by_id("s2").await.unwrap().unwrap().slug, "turban");
    }

    #[tokio::test]
    async fn likes_clamp_at_zero() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&new_style("s1", "Classic Wrap")).await.unwrap();

        assert_eq!(repo.adjust_likes("s1", false).await.unwrap(), Some(0));
        assert_eq!(repo.adjust_likes("s1", true).await.unwrap(), Some(1));
        assert_eq!(repo.adjust_likes("s1", false).await.unwrap(), Some(0));
        assert_eq!(repo.adjust_likes("ghost", true).await.unwrap(), None);
    }

    #[tokio::test]
    async fn views_increment() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&new_style("s1", "Classic Wrap")).await.unwrap();

        repo.increment_views("s1").await.unwrap();
        repo.increment_views("s1").await.unwrap();
        assert_eq!(repo.find_by_id("s1").await.unwrap().unwrap().views, 2);
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let (repo, _tmp) = create_test_repo();
        for (i, (name, difficulty, occasion)) in [
            ("Alpha", Difficulty::Advanced, Occasion::Wedding),
            ("Bravo", Difficulty::Beginner, Occasion::Office),
            ("Charlie", Difficulty::Beginner, Occasion::Casual),
            ("Delta", Difficulty::Intermediate, Occasion::Office),
        ]
        .into_iter()
        .enumerate()
        {
            let style = Style {
                difficulty,
                occasions: vec![occasion],
                ..new_style(&format!("s{i}"), name)
            };
            repo.insert(&style).await.unwrap();
        }
        let archived = Style {
            status: StyleStatus::Archived,
            ..new_style("s9", "Echo")
        };
        repo.insert(&archived).await.unwrap();

        let published = StyleFilter::published();
        let (page, total) = repo
            .list(&published, StyleSort::Difficulty, &PageRequest::new(1, 3))
            .await
            .unwrap();
        assert_eq!(total, 4);
        let names: Vec<_> = page.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Bravo", "Charlie", "Delta"]);

        let office = StyleFilter {
            occasions: vec![Occasion::Office, Occasion::Wedding],
            difficulty: Some(Difficulty::Beginner),
            ..StyleFilter::published()
        };
        let (page, total) = repo
            .list(&office, StyleSort::Name, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].name, "Bravo");
    }

    #[tokio::test]
    async fn suggestions_match_name_or_tag() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&new_style("s1", "Turkish Wrap")).await.unwrap();
        let tagged = Style {
            tags: vec!["turkish".into()],
            ..new_style("s2", "Layered")
        };
        repo.insert(&tagged).await.unwrap();
        repo.insert(&new_style("s3", "Sporty")).await.unwrap();

        let found = repo.suggestions("TURK", 10).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|s| s.id != "s3"));
    }

    #[tokio::test]
    async fn filter_options_cover_published_only() {
        let (repo, _tmp) = create_test_repo();
        let published = Style {
            occasions: vec![Occasion::Office, Occasion::Casual],
            tags: vec!["easy".into()],
            ..new_style("s1", "Classic Wrap")
        };
        let draft = Style {
            status: StyleStatus::Draft,
            difficulty: Difficulty::Advanced,
            tags: vec!["secret".into()],
            ..new_style("s2", "Draft Look")
        };
        repo.insert(&published).await.unwrap();
        repo.insert(&draft).await.unwrap();

        let options = repo.filter_options(20).await.unwrap();
        assert_eq!(options.difficulties, vec![Difficulty::Beginner]);
        assert_eq!(options.occasions, vec![Occasion::Casual, Occasion::Office]);
        assert_eq!(options.tags, vec!["easy"]);
    }
}
