use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use tracing::trace;

/// A fixed-capacity, thread-safe least-recently-used cache.
///
/// Entries live in a slab of nodes linked in recency order (head is most
/// recent). A hash map indexes keys to slab slots, so lookups, promotion and
/// eviction are all O(1). One mutex guards the map and the list together;
/// a read also promotes, so there is no separate read path.
///
/// Values are cloned out on [`get`](LruCache::get); store `Arc`s or small
/// values.
///
/// # Example
///
/// ```rust
/// use snip_cache::LruCache;
///
/// let cache = LruCache::new(2);
/// cache.set("a", 1);
/// cache.set("b", 2);
/// cache.get("a");
/// cache.set("c", 3);
///
/// assert_eq!(cache.get("b"), None);
/// assert_eq!(cache.get("a"), Some(1));
/// ```
pub struct LruCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::with_capacity(capacity),
                nodes: Vec::with_capacity(capacity),
                free_list: Vec::new(),
                head: None,
                tail: None,
                capacity,
            }),
        }
    }

    /// Returns a clone of the value for `key`, marking it most recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut inner = self.inner.lock();
        let index = *inner.map.get(key)?;
        inner.promote(index);
        inner.node(index).map(|node| node.value.clone())
    }

    /// Inserts or overwrites `key`, marking it most recently used.
    ///
    /// When the insert pushes the cache over capacity the least recently used
    /// entry is evicted.
    pub fn set(&self, key: K, value: V) {
        let mut inner = self.inner.lock();

        if let Some(&index) = inner.map.get(&key) {
            if let Some(node) = inner.node_mut(index) {
                node.value = value;
            }
            inner.promote(index);
            return;
        }

        let index = inner.allocate_slot(key.clone(), value);
        inner.map.insert(key, index);
        inner.attach_front(index);

        if inner.map.len() > inner.capacity && inner.evict_lru() {
            trace!(capacity = inner.capacity, "evicted least recently used entry");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LruCache")
            .field("len", &inner.map.len())
            .field("capacity", &inner.capacity)
            .finish()
    }
}

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner<K, V> {
    map: HashMap<K, usize>,
    nodes: Vec<Option<Node<K, V>>>,
    free_list: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash,
{
    fn node(&self, index: usize) -> Option<&Node<K, V>> {
        self.nodes.get(index).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, index: usize) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(index).and_then(Option::as_mut)
    }

    fn allocate_slot(&mut self, key: K, value: V) -> usize {
        let node = Node {
            key,
            value,
            prev: None,
            next: None,
        };
        if let Some(index) = self.free_list.pop() {
            self.nodes[index] = Some(node);
            index
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn promote(&mut self, index: usize) {
        if self.head == Some(index) {
            return;
        }
        self.detach(index);
        self.attach_front(index);
    }

    /// Drops the tail entry. Returns `false` if the list was empty.
    fn evict_lru(&mut self) -> bool {
        let Some(index) = self.tail else {
            return false;
        };
        self.detach(index);
        match self.nodes.get_mut(index).and_then(Option::take) {
            Some(node) => {
                self.map.remove(&node.key);
                self.free_list.push(index);
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, index: usize) {
        let (prev, next) = match self.node(index) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev_index) => {
                if let Some(prev_node) = self.node_mut(prev_index) {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_index) => {
                if let Some(next_node) = self.node_mut(next_index) {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(index) {
            node.prev = None;
            node.next = None;
        }
    }

    fn attach_front(&mut self, index: usize) {
        let head = self.head;
        if let Some(node) = self.node_mut(index) {
            node.prev = None;
            node.next = head;
        }

        match head {
            Some(head_index) => {
                if let Some(head_node) = self.node_mut(head_index) {
                    head_node.prev = Some(index);
                }
            }
            None => self.tail = Some(index),
        }

        self.head = Some(index);
    }
}
