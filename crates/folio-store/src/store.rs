//! Record stores: memoized lenses into the cache.
//!
//! Stores form a tree (parent to child by pointer + path) but own nothing;
//! the cache owns record values. Nodes live in a [`StoreArena`] addressed by
//! [`StoreHandle`], and parent links are handles rather than references.
//!
//! Child identity is by memo key `table:id:keyName[:path...]`: navigating
//! twice to the same pointer and path from the same parent yields the same
//! node, so change listeners attached through one navigation see every
//! other.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

use folio_text::editable::{EditableState, TypeData, apply_type_data, deduce_input};
use folio_text::markdown::{detect_shortcut, strip_prefix};
use folio_text::segment::toggle_annotations;
use folio_types::{
    Annotation, BlockType, CacheKey, Pointer, RecordValue, RecordWithRole, Role, Segment, Table,
    UserId, new_record_id,
};

use crate::cache::CacheEvent;
use crate::context::StoreContext;
use crate::error::{BugIndicatingError, Result};
use crate::transaction::{Transaction, record_body};

// ============================================================================
// Arena
// ============================================================================

/// Opaque index of a store node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StoreHandle(usize);

struct StoreNode {
    pointer: Pointer,
    user_id: UserId,
    path: Vec<String>,
    parent: Option<StoreHandle>,
    children: HashMap<String, StoreHandle>,
}

/// Owner of every store node in a context.
#[derive(Default)]
pub struct StoreArena {
    nodes: Vec<StoreNode>,
    roots: HashMap<String, StoreHandle>,
}

impl StoreArena {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn root(
        &mut self,
        user_id: &UserId,
        pointer: &Pointer,
        path: &[String],
    ) -> StoreHandle {
        let key = format!("{}/{}", user_id, memo_key(pointer, "root", path));
        if let Some(handle) = self.roots.get(&key) {
            return *handle;
        }
        let handle = self.push(StoreNode {
            pointer: pointer.clone(),
            user_id: user_id.clone(),
            path: path.to_vec(),
            parent: None,
            children: HashMap::new(),
        });
        self.roots.insert(key, handle);
        handle
    }

    fn child(
        &mut self,
        parent: StoreHandle,
        pointer: &Pointer,
        key_name: &str,
        path: &[String],
    ) -> StoreHandle {
        let key = memo_key(pointer, key_name, path);
        if let Some(handle) = self.nodes[parent.0].children.get(&key) {
            return *handle;
        }
        let user_id = self.nodes[parent.0].user_id.clone();
        let handle = self.push(StoreNode {
            pointer: pointer.clone(),
            user_id,
            path: path.to_vec(),
            parent: Some(parent),
            children: HashMap::new(),
        });
        self.nodes[parent.0].children.insert(key, handle);
        handle
    }

    fn push(&mut self, node: StoreNode) -> StoreHandle {
        self.nodes.push(node);
        StoreHandle(self.nodes.len() - 1)
    }

    fn node(&self, handle: StoreHandle) -> &StoreNode {
        &self.nodes[handle.0]
    }
}

fn memo_key(pointer: &Pointer, key_name: &str, path: &[String]) -> String {
    let mut key = format!("{}:{}:{}", pointer.table, pointer.id, key_name);
    for segment in path {
        key.push(':');
        key.push_str(segment);
    }
    key
}

// ============================================================================
// RecordStore
// ============================================================================

/// A lens onto `(user, pointer, path)` in the cache.
#[derive(Clone)]
pub struct RecordStore {
    ctx: StoreContext,
    handle: StoreHandle,
}

impl RecordStore {
    pub(crate) fn from_handle(ctx: StoreContext, handle: StoreHandle) -> Self {
        Self { ctx, handle }
    }

    pub fn handle(&self) -> StoreHandle {
        self.handle
    }

    pub fn context(&self) -> &StoreContext {
        &self.ctx
    }

    pub fn pointer(&self) -> Pointer {
        self.ctx.arena().read().node(self.handle).pointer.clone()
    }

    pub fn user_id(&self) -> UserId {
        self.ctx.arena().read().node(self.handle).user_id.clone()
    }

    pub fn path(&self) -> Vec<String> {
        self.ctx.arena().read().node(self.handle).path.clone()
    }

    /// The store this one was navigated from, if any.
    pub fn parent(&self) -> Option<RecordStore> {
        let parent = self.ctx.arena().read().node(self.handle).parent?;
        Some(Self::from_handle(self.ctx.clone(), parent))
    }

    pub fn key(&self) -> CacheKey {
        let arena = self.ctx.arena().read();
        let node = arena.node(self.handle);
        CacheKey::new(&node.pointer, &node.user_id)
    }

    pub fn get_record(&self) -> Option<RecordWithRole> {
        self.ctx.cache().get_record(&self.user_id(), &self.pointer())
    }

    pub fn role(&self) -> Role {
        self.ctx.cache().get_role(&self.user_id(), &self.pointer())
    }

    pub fn version(&self) -> u64 {
        self.ctx.cache().get_version(&self.user_id(), &self.pointer())
    }

    /// Space of the record, from the enriched pointer or the record itself.
    pub fn space_id(&self) -> Option<String> {
        let entry = self.ctx.cache().get_entry(&self.user_id(), &self.pointer())?;
        entry.pointer.space_id.or(entry.record.value.space_id)
    }

    /// The JSON value at this store's path. `None` when the record or any
    /// step of the path is absent; never an error.
    pub fn get_value(&self) -> Option<Value> {
        let record = self.get_record()?;
        let mut value = serde_json::to_value(&record.value).ok()?;
        for step in self.path() {
            value = match value {
                Value::Object(mut map) => map.remove(&step)?,
                Value::Array(mut items) => {
                    let index: usize = step.parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }
        Some(value)
    }

    /// [`get_value`](Self::get_value) decoded as `T`.
    pub fn get_value_as<T: DeserializeOwned>(&self) -> Option<T> {
        let value = self.get_value()?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::trace!(store = ?self, error = %e, "value did not decode");
                None
            }
        }
    }

    /// Memoized lens onto `name` below this store's path.
    pub fn property_store(&self, name: &str) -> RecordStore {
        let (pointer, mut path) = {
            let arena = self.ctx.arena().read();
            let node = arena.node(self.handle);
            (node.pointer.clone(), node.path.clone())
        };
        path.push(name.to_string());
        let handle = self.ctx.arena().write().child(self.handle, &pointer, "property", &path);
        Self::from_handle(self.ctx.clone(), handle)
    }

    /// Memoized child store for `pointer` at `path`.
    pub fn child_store(&self, pointer: &Pointer, path: &[&str]) -> RecordStore {
        let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        let handle = self.ctx.arena().write().child(self.handle, pointer, "child", &path);
        Self::from_handle(self.ctx.clone(), handle)
    }

    /// The same pointer and path seen by another user.
    pub fn clone_for_user(&self, user_id: &UserId) -> RecordStore {
        let (pointer, path) = {
            let arena = self.ctx.arena().read();
            let node = arena.node(self.handle);
            (node.pointer.clone(), node.path.clone())
        };
        let handle = self.ctx.arena().write().root(user_id, &pointer, &path);
        Self::from_handle(self.ctx.clone(), handle)
    }

    /// Change notifications for this store's record.
    pub fn subscribe(&self) -> StoreSubscription {
        StoreSubscription {
            key: self.key(),
            rx: self.ctx.cache().subscribe(),
        }
    }

    /// An open transaction for this store's user and space.
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.user_id(), self.space_id())
    }
}

impl PartialEq for RecordStore {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && self.ctx.same_context(&other.ctx)
    }
}

impl Eq for RecordStore {}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = self.ctx.arena().read();
        let node = arena.node(self.handle);
        f.debug_struct("RecordStore")
            .field("pointer", &node.pointer.to_string())
            .field("user", &node.user_id)
            .field("path", &node.path)
            .finish()
    }
}

/// Cache events filtered to one record.
pub struct StoreSubscription {
    key: CacheKey,
    rx: broadcast::Receiver<CacheEvent>,
}

impl StoreSubscription {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Wait for the next change to this record. Returns `false` once the
    /// cache is gone. A lagged receiver reports a change, since one may have
    /// been missed.
    pub async fn changed(&mut self) -> bool {
        loop {
            match self.rx.recv().await {
                Ok(CacheEvent::Changed { key }) if key == self.key => return true,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(key = %self.key, skipped = n, "store subscription lagged");
                    return true;
                }
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }

    /// Drain pending events without waiting; true if any concerned this record.
    pub fn try_changed(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.rx.try_recv() {
                Ok(CacheEvent::Changed { key }) => changed |= key == self.key,
                Err(broadcast::error::TryRecvError::Lagged(_)) => changed = true,
                Err(_) => return changed,
            }
        }
    }
}

// ============================================================================
// BlockStore
// ============================================================================

/// Typed view of a block or page record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockStore {
    store: RecordStore,
}

impl BlockStore {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn record_store(&self) -> &RecordStore {
        &self.store
    }

    pub fn pointer(&self) -> Pointer {
        self.store.pointer()
    }

    pub fn id(&self) -> String {
        self.store.pointer().id
    }

    pub fn value(&self) -> Option<RecordValue> {
        self.store.get_record().map(|r| r.value)
    }

    pub fn exists(&self) -> bool {
        self.store.get_record().is_some()
    }

    pub fn title(&self) -> Vec<Segment> {
        self.value().map(|v| v.title).unwrap_or_default()
    }

    pub fn plain_title(&self) -> String {
        self.value().map(|v| v.plain_title()).unwrap_or_default()
    }

    pub fn block_type(&self) -> BlockType {
        self.value().map(|v| v.block_type).unwrap_or_default()
    }

    pub fn children(&self) -> Vec<String> {
        self.value().and_then(|v| v.content).unwrap_or_default()
    }

    pub fn is_checked(&self) -> bool {
        self.value()
            .and_then(|v| v.property("checked").and_then(Value::as_bool))
            .unwrap_or(false)
    }

    /// Id of the child at `line`. Out-of-range lines are a caller bug.
    pub fn page_id(&self, line: usize) -> Result<String> {
        let children = self.children();
        match children.get(line) {
            Some(id) => Ok(id.clone()),
            None => Err(BugIndicatingError::new(format!(
                "line {line} out of bounds for {} with {} children",
                self.pointer(),
                children.len()
            ))
            .into()),
        }
    }

    /// Store for the child at `line`.
    pub fn child_block(&self, line: usize) -> Result<BlockStore> {
        let id = self.page_id(line)?;
        Ok(self.child(&id))
    }

    /// Stores for every child whose record is cached, in order.
    pub fn child_blocks(&self) -> Vec<BlockStore> {
        self.children()
            .iter()
            .map(|id| self.child(id))
            .filter(BlockStore::exists)
            .collect()
    }

    fn child(&self, id: &str) -> BlockStore {
        BlockStore::new(self.store.child_store(&Pointer::block(id), &[]))
    }

    /// Reconcile an input event into the title.
    ///
    /// Deduces the edit, splices it into the title segments, and converts a
    /// text block whose title just gained a Markdown prefix. Everything lands
    /// in one transaction.
    pub fn apply_input(
        &self,
        previous: &EditableState,
        current: &EditableState,
        could_be_emoji_input: bool,
    ) -> Result<TypeData> {
        let data = deduce_input(previous, current, could_be_emoji_input)?;
        if data.is_noop() && previous.value == current.value {
            return Ok(data);
        }

        let pointer = self.pointer();
        let mut title = apply_type_data(&self.title(), previous, current, &data);
        let mut txn = self.store.transaction();

        if self.block_type() == BlockType::Text {
            if let Some(shortcut) = detect_shortcut(&previous.value, &current.value) {
                title = strip_prefix(&title, &shortcut);
                txn.set(&pointer, &["type"], Value::from(shortcut.block_type.as_str()));
            }
        }
        txn.set(&pointer, &["title"], serde_json::to_value(&title)?);
        self.store.context().commit(txn)?;
        Ok(data)
    }

    /// Toggle `annotations` over `[start, end)` of the title.
    pub fn update_annotations(
        &self,
        start: usize,
        end: usize,
        annotations: &[Annotation],
    ) -> Result<Vec<Segment>> {
        let title = toggle_annotations(&self.title(), start, end, annotations)?;
        self.set_title(title.clone())?;
        Ok(title)
    }

    pub fn set_title(&self, title: Vec<Segment>) -> Result<()> {
        let mut txn = self.store.transaction();
        txn.set(&self.pointer(), &["title"], serde_json::to_value(&title)?);
        self.store.context().commit(txn)?;
        Ok(())
    }

    /// Create a block and append it to this record's children.
    pub fn append_child(&self, block_type: BlockType, title: Vec<Segment>) -> Result<BlockStore> {
        let parent = self.pointer();
        let id = new_record_id();
        let child = Pointer::block(&id);

        let mut value = RecordValue::block(&id, block_type)
            .with_title(title)
            .with_parent(&parent);
        value.space_id = self.store.space_id();

        let mut txn = self.store.transaction();
        let last = self.children().last().cloned();
        txn.set(&child, &[], record_body(&value)?)
            .list_after(&parent, &["content"], &id, last.as_deref());
        self.store.context().commit(txn)?;
        Ok(self.child(&id))
    }

    /// Unlink a child. Unknown ids are ignored.
    pub fn remove_child(&self, id: &str) -> Result<()> {
        let mut txn = self.store.transaction();
        txn.list_remove(&self.pointer(), &["content"], id);
        self.store.context().commit(txn)?;
        Ok(())
    }

    pub fn set_checked(&self, checked: bool) -> Result<()> {
        let mut txn = self.store.transaction();
        txn.update(&self.pointer(), &["properties"], serde_json::json!({ "checked": checked }));
        self.store.context().commit(txn)?;
        Ok(())
    }

    pub fn convert_type(&self, block_type: BlockType) -> Result<()> {
        let mut txn = self.store.transaction();
        txn.set(&self.pointer(), &["type"], Value::from(block_type.as_str()));
        self.store.context().commit(txn)?;
        Ok(())
    }

    /// Depth-first walk of the subtree below this block, skipping cycles.
    pub fn walk(&self, mut visit: impl FnMut(&BlockStore, usize)) {
        let mut seen = HashSet::new();
        seen.insert(self.id());
        walk_children(self, 0, &mut seen, &mut visit);
    }
}

fn walk_children(
    block: &BlockStore,
    depth: usize,
    seen: &mut HashSet<String>,
    visit: &mut impl FnMut(&BlockStore, usize),
) {
    for child in block.child_blocks() {
        if !seen.insert(child.id()) {
            tracing::warn!(block = %child.pointer(), "cycle in block tree");
            continue;
        }
        visit(&child, depth);
        walk_children(&child, depth + 1, seen, visit);
    }
}

// ============================================================================
// Spaces
// ============================================================================

/// A user's list of spaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpaceRootStore {
    store: RecordStore,
}

impl SpaceRootStore {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn record_store(&self) -> &RecordStore {
        &self.store
    }

    pub fn space_ids(&self) -> Vec<String> {
        self.store.property_store("content").get_value_as().unwrap_or_default()
    }

    pub fn space_stores(&self) -> Vec<SpaceStore> {
        self.space_ids()
            .iter()
            .map(|id| SpaceStore::new(self.store.child_store(&Pointer::space(id), &[])))
            .collect()
    }

    /// Create a space and list it under this root, creating the root on
    /// first use.
    pub fn add_space(&self, name: &str) -> Result<SpaceStore> {
        let root = self.store.pointer();
        let id = new_record_id();
        let space = Pointer::space(&id);

        let mut txn = self.store.transaction();
        if self.store.get_record().is_none() {
            txn.set(&root, &[], record_body(&RecordValue::new(Table::SpaceRoot, &root.id))?);
        }
        let mut value = RecordValue::new(Table::Space, &id).with_title(vec![Segment::plain(name)]);
        value.space_id = Some(id.clone());
        txn.set(&space, &[], record_body(&value)?)
            .list_after(&root, &["content"], &id, None);
        self.store.context().commit(txn)?;

        Ok(SpaceStore::new(self.store.child_store(&space.with_space(&id), &[])))
    }
}

/// A space and its pages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpaceStore {
    store: RecordStore,
}

impl SpaceStore {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn record_store(&self) -> &RecordStore {
        &self.store
    }

    pub fn id(&self) -> String {
        self.store.pointer().id
    }

    pub fn name(&self) -> String {
        self.store
            .get_record()
            .map(|r| r.value.plain_title())
            .unwrap_or_default()
    }

    pub fn page_ids(&self) -> Vec<String> {
        self.store.property_store("content").get_value_as().unwrap_or_default()
    }

    pub fn page_stores(&self) -> Vec<BlockStore> {
        self.page_ids()
            .iter()
            .map(|id| BlockStore::new(self.store.child_store(&Pointer::page(id), &[])))
            .collect()
    }

    /// Create a page at the end of this space.
    pub fn add_page(&self, title: &str) -> Result<BlockStore> {
        let space = self.store.pointer();
        let id = new_record_id();
        let page = Pointer::page(&id);

        let mut value = RecordValue::new(Table::Page, &id)
            .with_title(vec![Segment::plain(title)])
            .with_parent(&space);
        value.block_type = BlockType::Page;
        value.space_id = Some(space.id.clone());

        let mut txn = self.store.transaction();
        let last = self.page_ids().last().cloned();
        txn.set(&page, &[], record_body(&value)?)
            .list_after(&space, &["content"], &id, last.as_deref());
        self.store.context().commit(txn)?;

        Ok(BlockStore::new(self.store.child_store(&page, &[])))
    }
}
