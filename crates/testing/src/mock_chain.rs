use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use nft_export::{
    AddressNormalizer, BlockHash, ChainClient, CollectionId, CollectionLimits, CrossAccountId,
    RawCollection, TokenId, TokenPayload, SCHEMA_VERSION_IMAGE_URL,
};
use serde_json::json;

/// Network prefix of the Unique chain.
pub const UNIQUE_SS58_PREFIX: u16 = 7391;

/// Settings of a collection created through [`MockChain::create_collection`].
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    pub name: String,
    pub description: String,
    pub token_prefix: String,
    pub schema_version: String,
    pub const_on_chain_schema: String,
    pub variable_on_chain_schema: String,
    pub offchain_schema: String,
    pub limits: CollectionLimits,
}

impl Default for CollectionSpec {
    fn default() -> Self {
        Self {
            name: "test".to_string(),
            description: "test description".to_string(),
            token_prefix: "tst".to_string(),
            schema_version: SCHEMA_VERSION_IMAGE_URL.to_string(),
            const_on_chain_schema: String::new(),
            variable_on_chain_schema: String::new(),
            offchain_schema: String::new(),
            limits: CollectionLimits::default(),
        }
    }
}

impl CollectionSpec {
    pub fn with_const_schema(mut self, version: &str, descriptor: &str) -> Self {
        self.schema_version = version.to_string();
        self.const_on_chain_schema = descriptor.to_string();
        self
    }
}

#[derive(Debug, Clone)]
struct TokenState {
    owner: CrossAccountId,
    payload: TokenPayload,
}

#[derive(Debug, Clone)]
struct CollectionState {
    raw: RawCollection,
    admins: Vec<CrossAccountId>,
    last_token_id: TokenId,
    tokens: BTreeMap<TokenId, TokenState>,
}

#[derive(Debug, Clone, Default)]
struct ChainState {
    collections: BTreeMap<CollectionId, CollectionState>,
}

#[derive(Debug, Default)]
struct History {
    blocks: Vec<(BlockHash, ChainState)>,
    failing_tokens: HashSet<(CollectionId, TokenId)>,
    token_latency: HashMap<(CollectionId, TokenId), Duration>,
}

fn block_hash_for(number: u64) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    BlockHash::from_bytes(bytes)
}

/// In-memory chain with per-block history.
pub struct MockChain {
    normalizer: AddressNormalizer,
    history: RwLock<History>,
    token_requests: AtomicUsize,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    /// A chain using the Unique network prefix, holding only a genesis block.
    pub fn new() -> Self {
        Self::with_prefix(UNIQUE_SS58_PREFIX).expect("Unique prefix is a valid SS58 prefix")
    }

    pub fn with_prefix(ss58_prefix: u16) -> Result<Self> {
        let normalizer = AddressNormalizer::new(ss58_prefix)
            .map_err(|e| anyhow!("invalid SS58 prefix {ss58_prefix}: {e}"))?;
        let history = History {
            blocks: vec![(block_hash_for(0), ChainState::default())],
            failing_tokens: HashSet::new(),
            token_latency: HashMap::new(),
        };
        Ok(Self {
            normalizer,
            history: RwLock::new(history),
            token_requests: AtomicUsize::new(0),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, History> {
        self.history.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, History> {
        self.history.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hash of the newest block.
    pub fn head(&self) -> BlockHash {
        let history = self.read();
        let (hash, _) = &history.blocks[history.blocks.len() - 1];
        hash.clone()
    }

    pub fn head_number(&self) -> u64 {
        (self.read().blocks.len() - 1) as u64
    }

    /// Owner and payload reads served so far.
    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    /// Make every read of one token fail, as a broken node would.
    pub fn fail_token(&self, collection_id: CollectionId, token_id: TokenId) {
        self.write().failing_tokens.insert((collection_id, token_id));
    }

    /// Delay every read of one token by `latency`.
    pub fn set_token_latency(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        latency: Duration,
    ) {
        self.write()
            .token_latency
            .insert((collection_id, token_id), latency);
    }

    fn chain_format(&self, address: &str) -> Result<String> {
        self.normalizer
            .to_chain_format(address)
            .map_err(|e| anyhow!("invalid address {address}: {e}"))
    }

    fn substrate(&self, address: &str) -> Result<CrossAccountId> {
        self.chain_format(address).map(CrossAccountId::Substrate)
    }

    /// Apply `mutate` to a copy of the head state and append it as a new block.
    fn commit<T>(&self, mutate: impl FnOnce(&mut ChainState) -> Result<T>) -> Result<T> {
        let mut history = self.write();
        let mut state = history.blocks[history.blocks.len() - 1].1.clone();
        let output = mutate(&mut state)?;
        let hash = block_hash_for(history.blocks.len() as u64);
        history.blocks.push((hash, state));
        Ok(output)
    }

    pub fn create_collection(&self, owner: &str, spec: CollectionSpec) -> Result<CollectionId> {
        let owner = self.chain_format(owner)?;
        let raw = RawCollection {
            owner,
            mode: json!("NFT"),
            access: json!("Normal"),
            name: RawCollection::encode_code_units(&spec.name),
            description: RawCollection::encode_code_units(&spec.description),
            token_prefix: spec.token_prefix,
            mint_mode: false,
            offchain_schema: spec.offchain_schema,
            schema_version: spec.schema_version,
            sponsorship: json!("Disabled"),
            limits: spec.limits,
            variable_on_chain_schema: spec.variable_on_chain_schema,
            const_on_chain_schema: spec.const_on_chain_schema,
            meta_update_permission: json!("ItemOwner"),
            extra: serde_json::Map::new(),
        };

        self.commit(|state| {
            let id = state.collections.keys().next_back().map_or(1, |last| last + 1);
            state.collections.insert(
                id,
                CollectionState {
                    raw,
                    admins: Vec::new(),
                    last_token_id: 0,
                    tokens: BTreeMap::new(),
                },
            );
            Ok(id)
        })
    }

    pub fn mint(
        &self,
        collection_id: CollectionId,
        owner: &str,
        const_data: Vec<u8>,
        variable_data: impl Into<Vec<u8>>,
    ) -> Result<TokenId> {
        let owner = self.substrate(owner)?;
        let payload = TokenPayload {
            const_data,
            variable_data: variable_data.into(),
        };
        self.commit(|state| {
            let collection = collection_mut(state, collection_id)?;
            collection.last_token_id += 1;
            let token_id = collection.last_token_id;
            collection
                .tokens
                .insert(token_id, TokenState { owner, payload });
            Ok(token_id)
        })
    }

    pub fn transfer(&self, collection_id: CollectionId, token_id: TokenId, to: &str) -> Result<()> {
        let to = self.substrate(to)?;
        self.commit(|state| {
            token_mut(state, collection_id, token_id)?.owner = to;
            Ok(())
        })
    }

    pub fn set_variable_data(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        data: impl Into<Vec<u8>>,
    ) -> Result<()> {
        let data = data.into();
        self.commit(|state| {
            token_mut(state, collection_id, token_id)?.payload.variable_data = data;
            Ok(())
        })
    }

    pub fn burn(&self, collection_id: CollectionId, token_id: TokenId) -> Result<()> {
        self.commit(|state| {
            collection_mut(state, collection_id)?
                .tokens
                .remove(&token_id)
                .ok_or_else(|| anyhow!("token {collection_id}/{token_id} does not exist"))?;
            Ok(())
        })
    }

    pub fn add_admin(&self, collection_id: CollectionId, admin: &str) -> Result<()> {
        let admin = self.substrate(admin)?;
        self.commit(|state| {
            collection_mut(state, collection_id)?.admins.push(admin);
            Ok(())
        })
    }

    /// Run `read` against the state at `at`, or the head when `None`.
    fn with_state<T>(
        &self,
        at: Option<&BlockHash>,
        read: impl FnOnce(&ChainState) -> T,
    ) -> Result<T> {
        let history = self.read();
        let state = match at {
            None => &history.blocks[history.blocks.len() - 1].1,
            Some(hash) => history
                .blocks
                .iter()
                .find(|(candidate, _)| candidate == hash)
                .map(|(_, state)| state)
                .ok_or_else(|| anyhow!("unknown block hash {hash}"))?,
        };
        Ok(read(state))
    }

    async fn token_read(&self, collection_id: CollectionId, token_id: TokenId) -> Result<()> {
        self.token_requests.fetch_add(1, Ordering::SeqCst);
        let key = (collection_id, token_id);
        let (failing, latency) = {
            let history = self.read();
            let failing = history.failing_tokens.contains(&key);
            let latency = history.token_latency.get(&key).copied();
            (failing, latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if failing {
            bail!("injected failure reading token {collection_id}/{token_id}");
        }
        Ok(())
    }
}

fn collection_mut(
    state: &mut ChainState,
    collection_id: CollectionId,
) -> Result<&mut CollectionState> {
    state
        .collections
        .get_mut(&collection_id)
        .ok_or_else(|| anyhow!("collection {collection_id} does not exist"))
}

fn token_mut(
    state: &mut ChainState,
    collection_id: CollectionId,
    token_id: TokenId,
) -> Result<&mut TokenState> {
    collection_mut(state, collection_id)?
        .tokens
        .get_mut(&token_id)
        .ok_or_else(|| anyhow!("token {collection_id}/{token_id} does not exist"))
}

#[async_trait]
impl ChainClient for MockChain {
    async fn ss58_prefix(&self) -> Result<u16> {
        Ok(self.normalizer.chain_prefix())
    }

    async fn latest_block_number(&self) -> Result<u64> {
        Ok(self.head_number())
    }

    async fn block_hash(&self, number: u64) -> Result<Option<BlockHash>> {
        let history = self.read();
        Ok(usize::try_from(number)
            .ok()
            .and_then(|index| history.blocks.get(index))
            .map(|(hash, _)| hash.clone()))
    }

    async fn collection_by_id(
        &self,
        collection_id: CollectionId,
        at: Option<&BlockHash>,
    ) -> Result<Option<RawCollection>> {
        self.with_state(at, |state| {
            state
                .collections
                .get(&collection_id)
                .map(|collection| collection.raw.clone())
        })
    }

    async fn last_token_id(
        &self,
        collection_id: CollectionId,
        at: Option<&BlockHash>,
    ) -> Result<TokenId> {
        self.with_state(at, |state| {
            state
                .collections
                .get(&collection_id)
                .map_or(0, |collection| collection.last_token_id)
        })
    }

    async fn collection_admins(
        &self,
        collection_id: CollectionId,
        at: Option<&BlockHash>,
    ) -> Result<Vec<CrossAccountId>> {
        self.with_state(at, |state| {
            state
                .collections
                .get(&collection_id)
                .map(|collection| collection.admins.clone())
                .unwrap_or_default()
        })
    }

    async fn token_owner(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        at: Option<&BlockHash>,
    ) -> Result<Option<CrossAccountId>> {
        self.token_read(collection_id, token_id).await?;
        self.with_state(at, |state| {
            state
                .collections
                .get(&collection_id)
                .and_then(|collection| collection.tokens.get(&token_id))
                .map(|token| token.owner.clone())
        })
    }

    async fn token_data(
        &self,
        collection_id: CollectionId,
        token_id: TokenId,
        at: Option<&BlockHash>,
    ) -> Result<TokenPayload> {
        self.token_read(collection_id, token_id).await?;
        self.with_state(at, |state| {
            state
                .collections
                .get(&collection_id)
                .and_then(|collection| collection.tokens.get(&token_id))
                .map(|token| token.payload.clone())
                .unwrap_or_default()
        })
    }
}
