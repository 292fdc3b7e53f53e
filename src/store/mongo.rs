//! MongoDB-backed [`Store`] adapter, grounded on the teacher's
//! `db_client::DbClient` / `providers::eth_provider::database::Database`
//! wrapper: one collection per table, a thin typed accessor per
//! operation. The relational-driver-and-migrations layer this replaces is
//! explicitly out of scope for the core (`spec.md` §1); this adapter exists
//! so the binary is runnable end to end, not as the subject under test —
//! the core's own tests run against [`super::mock::MockStore`].

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOptions, UpdateModifications, UpdateOptions};
use mongodb::{Client, Database as MongoDatabase};
use serde::{Deserialize, Serialize};

use super::{Account, Output, Store, Transaction, TxStatus};
use crate::error::StoreError;

const SETTINGS: &str = "settings";
const TRANSACTIONS: &str = "transactions";
const ACCOUNTS: &str = "accounts";
const OUTPUTS: &str = "outputs";

#[derive(Debug, Clone)]
pub struct MongoStore {
    database: MongoDatabase,
}

impl MongoStore {
    /// Connects to `uri` and selects `database_name`.
    pub async fn connect(uri: &str, database_name: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await.map_err(|e| StoreError::Insert(e.to_string()))?;
        Ok(Self { database: client.database(database_name) })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingDoc {
    key: String,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TransactionDoc {
    id: String,
    hash: String,
    from: String,
    to: String,
    amount: String,
    status: Option<String>,
    block: Option<i64>,
    timestamp: Option<i64>,
    marked: bool,
    confirmations: i64,
}

impl From<&Transaction> for TransactionDoc {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.clone(),
            hash: tx.hash.clone(),
            from: tx.from.clone(),
            to: tx.to.clone(),
            amount: tx.amount.to_string(),
            status: tx.status.map(|s| s.as_str().to_string()),
            block: tx.block.map(|b| b as i64),
            timestamp: tx.timestamp.map(|t| t as i64),
            marked: tx.marked,
            confirmations: tx.confirmations as i64,
        }
    }
}

impl TryFrom<TransactionDoc> for Transaction {
    type Error = StoreError;

    fn try_from(doc: TransactionDoc) -> Result<Self, Self::Error> {
        let status = match doc.status.as_deref() {
            Some("failed") => Some(TxStatus::Failed),
            Some("successful") => Some(TxStatus::Successful),
            Some(other) => return Err(StoreError::Select(format!("unknown status {other}"))),
            None => None,
        };
        Ok(Self {
            id: doc.id,
            hash: doc.hash,
            from: doc.from,
            to: doc.to,
            amount: doc.amount.parse().map_err(|e| StoreError::Select(format!("bad amount: {e}")))?,
            status,
            block: doc.block.map(|b| b as u64),
            timestamp: doc.timestamp.map(|t| t as u64),
            marked: doc.marked,
            confirmations: doc.confirmations as u64,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AccountDoc {
    id: String,
    public_key: String,
    balance: String,
}

impl From<&Account> for AccountDoc {
    fn from(account: &Account) -> Self {
        Self { id: account.id.clone(), public_key: account.public_key.clone(), balance: account.balance.to_string() }
    }
}

impl TryFrom<AccountDoc> for Account {
    type Error = StoreError;

    fn try_from(doc: AccountDoc) -> Result<Self, Self::Error> {
        Ok(Self {
            id: doc.id,
            public_key: doc.public_key,
            balance: doc.balance.parse().map_err(|e| StoreError::AccountLookup(format!("bad balance: {e}")))?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OutputDoc {
    id: String,
    hash: String,
    account: String,
}

impl From<&Output> for OutputDoc {
    fn from(output: &Output) -> Self {
        Self { id: output.id.clone(), hash: output.hash.clone(), account: output.account.clone() }
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn find_setting_by_key(&self, key: &str) -> Result<Option<String>, StoreError> {
        let doc = self
            .database
            .collection::<SettingDoc>(SETTINGS)
            .find_one(doc! { "key": key })
            .await
            .map_err(|e| StoreError::Setting(e.to_string()))?;
        Ok(doc.map(|d| d.value))
    }

    async fn save_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.database
            .collection::<SettingDoc>(SETTINGS)
            .update_one(
                doc! { "key": key },
                UpdateModifications::Document(doc! { "$set": { "key": key, "value": value } }),
            )
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await
            .map_err(|e| StoreError::Setting(e.to_string()))?;
        Ok(())
    }

    async fn insert_transactions_atomic(&self, transactions: &[Transaction]) -> Result<(), StoreError> {
        if transactions.is_empty() {
            return Ok(());
        }
        let docs: Vec<TransactionDoc> = transactions.iter().map(TransactionDoc::from).collect();
        let client = self.database.client();
        let mut session = client.start_session(None).await.map_err(|e| StoreError::Insert(e.to_string()))?;
        session.start_transaction(None).await.map_err(|e| StoreError::Insert(e.to_string()))?;
        let collection = self.database.collection::<TransactionDoc>(TRANSACTIONS);
        let insert_result = collection.insert_many(docs).session(&mut session).await;
        match insert_result {
            Ok(_) => session.commit_transaction().await.map_err(|e| StoreError::Insert(e.to_string())),
            Err(e) => {
                let _ = session.abort_transaction().await;
                Err(StoreError::Insert(e.to_string()))
            }
        }
    }

    async fn select_transactions_confirmations_at_most(
        &self,
        max_confirmations: u64,
    ) -> Result<Vec<Transaction>, StoreError> {
        let cursor = self
            .database
            .collection::<TransactionDoc>(TRANSACTIONS)
            .find(doc! { "confirmations": { "$lte": max_confirmations as i64 } })
            .await
            .map_err(|e| StoreError::Select(e.to_string()))?;
        collect(cursor).await
    }

    async fn select_deliverable_transactions(&self, limit: u64) -> Result<Vec<Transaction>, StoreError> {
        let accounts: Vec<String> = self
            .database
            .collection::<AccountDoc>(ACCOUNTS)
            .find(Document::new())
            .await
            .map_err(|e| StoreError::Select(e.to_string()))?
            .try_collect_ids()
            .await?;

        let filter = doc! {
            "to": { "$in": accounts },
            "$or": [ { "confirmations": { "$lt": 3 } }, { "marked": false } ],
        };
        let options = FindOptions::builder().sort(doc! { "block": 1 }).limit(limit as i64).build();
        let cursor = self
            .database
            .collection::<TransactionDoc>(TRANSACTIONS)
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| StoreError::Select(e.to_string()))?;
        collect(cursor).await
    }

    async fn update_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        let doc = TransactionDoc::from(transaction);
        let bson = mongodb::bson::to_document(&doc).map_err(|e| StoreError::Update(e.to_string()))?;
        self.database
            .collection::<TransactionDoc>(TRANSACTIONS)
            .update_one(doc! { "id": &transaction.id }, UpdateModifications::Document(doc! { "$set": bson }))
            .await
            .map_err(|e| StoreError::Update(e.to_string()))?;
        Ok(())
    }

    async fn find_account_by_public_key(&self, address: &str) -> Result<Option<Account>, StoreError> {
        let doc = self
            .database
            .collection::<AccountDoc>(ACCOUNTS)
            .find_one(doc! { "public_key": address })
            .await
            .map_err(|e| StoreError::AccountLookup(e.to_string()))?;
        doc.map(Account::try_from).transpose()
    }

    async fn upsert_account(&self, account: Account) -> Result<(), StoreError> {
        let doc = AccountDoc::from(&account);
        let bson = mongodb::bson::to_document(&doc).map_err(|e| StoreError::AccountUpsert(e.to_string()))?;
        self.database
            .collection::<AccountDoc>(ACCOUNTS)
            .update_one(doc! { "public_key": &account.public_key }, UpdateModifications::Document(doc! { "$set": bson }))
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await
            .map_err(|e| StoreError::AccountUpsert(e.to_string()))?;
        Ok(())
    }

    async fn insert_output(&self, output: Output) -> Result<(), StoreError> {
        let doc = OutputDoc::from(&output);
        self.database
            .collection::<OutputDoc>(OUTPUTS)
            .insert_one(doc)
            .await
            .map_err(|e| StoreError::OutputInsert(e.to_string()))?;
        Ok(())
    }
}

async fn collect(mut cursor: mongodb::Cursor<TransactionDoc>) -> Result<Vec<Transaction>, StoreError> {
    use futures::TryStreamExt;
    let mut out = Vec::new();
    while let Some(doc) = cursor.try_next().await.map_err(|e| StoreError::Select(e.to_string()))? {
        out.push(Transaction::try_from(doc)?);
    }
    Ok(out)
}

#[async_trait]
trait CollectIds {
    async fn try_collect_ids(self) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
impl CollectIds for mongodb::Cursor<AccountDoc> {
    async fn try_collect_ids(mut self) -> Result<Vec<String>, StoreError> {
        use futures::TryStreamExt;
        let mut out = Vec::new();
        while let Some(doc) = self.try_next().await.map_err(|e| StoreError::Select(e.to_string()))? {
            out.push(doc.public_key);
        }
        Ok(out)
    }
}
