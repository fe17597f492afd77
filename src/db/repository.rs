use sqlx::{postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;

use crate::db::DbError;
use crate::query::{bind_params, bind_params_as, Pagination, WhereBuilder};

/// Typed read helpers over one table. Tables carry a `deleted_at` column;
/// every query here excludes soft-deleted rows.
pub struct Repository<T> {
    table_name: String,
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(table_name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            table_name: table_name.into(),
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_where(
        &self,
        wb: &WhereBuilder,
        order: &str,
        page: &Pagination,
    ) -> Result<Vec<T>, DbError> {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE {} {} {}",
            self.table_name,
            wb.sql(),
            order,
            page.sql()
        );
        let q = bind_params_as(sqlx::query_as::<_, T>(&sql), wb.params());
        Ok(q.fetch_all(&self.pool).await?)
    }

    pub async fn select_by_id(&self, id: Uuid) -> Result<Option<T>, DbError> {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE id = $1 AND deleted_at IS NULL",
            self.table_name
        );
        let row = sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn select_404(&self, id: Uuid) -> Result<T, DbError> {
        self.select_by_id(id)
            .await?
            .ok_or_else(|| DbError::NotFound("Record not found".to_string()))
    }

    pub async fn count(&self, wb: &WhereBuilder) -> Result<i64, DbError> {
        let sql = format!(
            "SELECT COUNT(*) FROM \"{}\" WHERE {}",
            self.table_name,
            wb.sql()
        );
        let q = bind_params(sqlx::query(&sql), wb.params());
        let row = q.fetch_one(&self.pool).await?;
        use sqlx::Row;
        let count: i64 = row.try_get(0)?;
        Ok(count)
    }
}
