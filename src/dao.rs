use std::sync::Arc;

use crate::bind::bind;
use crate::config::Features;
use crate::error::Result;
use crate::registry::TypeRegistry;
use crate::template::{rewrite, QueryInputs};
use crate::traits::{DatabaseDriver, GeneratedKeys, PreparedStatement, ValueObject};
use crate::types::{Identities, InsertResults, ResultRows, SqlValue};

/// Runs query templates against a driver.
///
/// Every call rewrites the template, prepares the SQL, binds the values and
/// executes. Created from an [`RdaxClient`](crate::RdaxClient); cheap to clone.
#[derive(Clone)]
pub struct Dao {
    driver: Arc<dyn DatabaseDriver>,
    registry: Arc<TypeRegistry>,
    features: Features,
}

impl Dao {
    pub fn new(
        driver: Arc<dyn DatabaseDriver>,
        registry: Arc<TypeRegistry>,
        features: Features,
    ) -> Self {
        Self {
            driver,
            registry,
            features,
        }
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Runs a query and returns a cursor over its rows.
    ///
    /// # Example
    /// ```ignore
    /// let mut rows = dao
    ///     .select("select id, name from person where id in (??)", vec![], vec![ids])
    ///     .await?;
    /// while rows.advance().await? {
    ///     let name: Option<String> = rows.get("name")?;
    /// }
    /// ```
    pub async fn select(
        &self,
        sql: &str,
        values: Vec<SqlValue>,
        ins: Vec<Vec<SqlValue>>,
    ) -> Result<ResultRows> {
        let mut statement = self.prepare(sql, values, ins, GeneratedKeys::None).await?;
        let result = match statement.execute_query().await {
            Ok(result) => result,
            Err(e) => {
                statement.close();
                return Err(e);
            }
        };
        Ok(ResultRows::new(
            result,
            Some(statement),
            Arc::clone(&self.registry),
            !self.features.null_results_disabled,
        ))
    }

    /// Runs a query with the fields of `vo` as its values.
    pub async fn select_vo<V: ValueObject>(
        &self,
        vo: &V,
        sql: &str,
        ins: Vec<Vec<SqlValue>>,
    ) -> Result<ResultRows> {
        self.select(sql, vo.values(), ins).await
    }

    /// Runs an update and returns the affected row count.
    pub async fn update(
        &self,
        sql: &str,
        values: Vec<SqlValue>,
        ins: Vec<Vec<SqlValue>>,
    ) -> Result<u64> {
        let mut statement = self.prepare(sql, values, ins, GeneratedKeys::None).await?;
        let count = statement.execute_update().await;
        statement.close();
        let count = count?;
        tracing::debug!(count, "update executed");
        Ok(count)
    }

    /// Runs an update whose values are `values` followed by `wheres`.
    pub async fn update_where(
        &self,
        sql: &str,
        mut values: Vec<SqlValue>,
        wheres: Vec<SqlValue>,
        ins: Vec<Vec<SqlValue>>,
    ) -> Result<u64> {
        values.extend(wheres);
        self.update(sql, values, ins).await
    }

    /// Runs an update whose values are the fields of `vo` followed by `wheres`.
    pub async fn update_vo<V: ValueObject>(
        &self,
        vo: &V,
        wheres: Vec<SqlValue>,
        sql: &str,
        ins: Vec<Vec<SqlValue>>,
    ) -> Result<u64> {
        self.update_where(sql, vo.values(), wheres, ins).await
    }

    /// Runs an insert. Generated identities are collected when the client
    /// uses generated keys, or for `return_fields` when any are named.
    pub async fn insert(
        &self,
        sql: &str,
        values: Vec<SqlValue>,
        return_fields: &[&str],
    ) -> Result<InsertResults> {
        let keys = self.generated_keys(return_fields);
        let requested = keys.is_requested();
        let mut statement = self.prepare(sql, values, Vec::new(), keys).await?;
        let outcome = Self::execute_insert(statement.as_mut(), requested).await;
        statement.close();
        let results = outcome?;
        tracing::debug!(
            count = results.count,
            identities = results.identities.as_ref().map_or(0, Identities::len),
            "insert executed"
        );
        Ok(results)
    }

    /// Runs an insert with the fields of `vo` as its values.
    pub async fn insert_vo<V: ValueObject>(
        &self,
        vo: &V,
        sql: &str,
        return_fields: &[&str],
    ) -> Result<InsertResults> {
        self.insert(sql, vo.values(), return_fields).await
    }

    /// Runs an insert and returns a single number: the affected row count
    /// when no identities were requested, otherwise the first generated
    /// identity, or `-1` when the driver reported none.
    pub async fn insert_one(
        &self,
        sql: &str,
        values: Vec<SqlValue>,
        return_fields: &[&str],
    ) -> Result<i64> {
        let results = self.insert(sql, values, return_fields).await?;
        match results.identities {
            None => Ok(i64::try_from(results.count).unwrap_or(i64::MAX)),
            Some(identities) if identities.is_empty() => Ok(-1),
            Some(identities) => identities.as_i64(&self.registry, 0),
        }
    }

    /// [`insert_one`](Dao::insert_one) with the fields of `vo` as its values.
    pub async fn insert_one_vo<V: ValueObject>(
        &self,
        vo: &V,
        sql: &str,
        return_fields: &[&str],
    ) -> Result<i64> {
        self.insert_one(sql, vo.values(), return_fields).await
    }

    fn generated_keys(&self, return_fields: &[&str]) -> GeneratedKeys {
        if !return_fields.is_empty() {
            GeneratedKeys::Columns(return_fields.iter().map(|f| f.to_string()).collect())
        } else if self.features.use_generated_keys {
            GeneratedKeys::All
        } else {
            GeneratedKeys::None
        }
    }

    async fn execute_insert(
        statement: &mut dyn PreparedStatement,
        requested: bool,
    ) -> Result<InsertResults> {
        let count = statement.execute_update().await?;
        if !requested {
            return Ok(InsertResults {
                count,
                identities: None,
            });
        }
        let identities = match statement.generated_identities().await? {
            Some(mut result) => {
                let identities = Identities::read(result.as_mut()).await;
                result.close();
                identities?
            }
            None => Identities::default(),
        };
        Ok(InsertResults {
            count,
            identities: Some(identities),
        })
    }

    /// Rewrites, prepares and binds. The statement is closed again when
    /// binding fails.
    async fn prepare(
        &self,
        sql: &str,
        values: Vec<SqlValue>,
        ins: Vec<Vec<SqlValue>>,
        keys: GeneratedKeys,
    ) -> Result<Box<dyn PreparedStatement>> {
        let QueryInputs { sql, values } = rewrite(sql, values, ins)?;
        tracing::debug!(%sql, params = values.len(), "preparing statement");

        let mut statement = self.driver.prepare(&sql, keys).await?;
        if let Err(e) = bind(&self.registry, statement.as_mut(), values) {
            statement.close();
            return Err(e);
        }
        Ok(statement)
    }
}

impl std::fmt::Debug for Dao {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dao")
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}
