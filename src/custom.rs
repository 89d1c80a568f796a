//! Extension points for user-defined meta events and chunks.
//!
//! A custom type is registered against its wire identifier (a meta type byte or a chunk id) in
//! an [`EventTypesCollection`] or a [`ChunkTypesCollection`]. The reader constructs registered
//! types through their `Default` impl and hands them their payload; the writer looks up the
//! identifier of a custom value through its Rust type.

use crate::{
    chunk::ChunkId,
    prelude::*,
    settings::{ReadingSettings, WritingSettings},
};
use std::{any::Any, any::TypeId, collections::HashMap};

/// A meta event type defined outside of this crate.
pub trait CustomMetaEvent: fmt::Debug + Send + Sync + 'static {
    /// Decode the event from its payload, which is exactly the declared meta event length.
    fn read_content(&mut self, data: &[u8], settings: &ReadingSettings) -> Result<()>;
    /// Encode the payload of the event. Exactly `content_size` bytes must be written.
    fn write_content(&self, out: &mut dyn io::Write, settings: &WritingSettings) -> Result<()>;
    fn content_size(&self, settings: &WritingSettings) -> usize;
}

/// A chunk type defined outside of this crate.
pub trait CustomChunk: fmt::Debug + Send + Sync + 'static {
    /// Decode the chunk from its content, which is exactly the declared chunk size.
    fn read_content(&mut self, data: &[u8], settings: &ReadingSettings) -> Result<()>;
    /// Encode the content of the chunk. Exactly `content_size` bytes must be written.
    fn write_content(&self, out: &mut dyn io::Write, settings: &WritingSettings) -> Result<()>;
    fn content_size(&self, settings: &WritingSettings) -> usize;
}

/// Object-safe cloning and comparison, implemented for every `Clone + PartialEq` custom type.
pub trait DynCustomMeta: CustomMetaEvent {
    fn clone_box(&self) -> Box<dyn DynCustomMeta>;
    fn eq_dyn(&self, other: &dyn DynCustomMeta) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}
impl<T: CustomMetaEvent + Clone + PartialEq> DynCustomMeta for T {
    fn clone_box(&self) -> Box<dyn DynCustomMeta> {
        Box::new(self.clone())
    }
    fn eq_dyn(&self, other: &dyn DynCustomMeta) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Object-safe cloning and comparison, implemented for every `Clone + PartialEq` custom chunk.
pub trait DynCustomChunk: CustomChunk {
    fn clone_box(&self) -> Box<dyn DynCustomChunk>;
    fn eq_dyn(&self, other: &dyn DynCustomChunk) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}
impl<T: CustomChunk + Clone + PartialEq> DynCustomChunk for T {
    fn clone_box(&self) -> Box<dyn DynCustomChunk> {
        Box::new(self.clone())
    }
    fn eq_dyn(&self, other: &dyn DynCustomChunk) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// An owned custom meta event.
pub struct CustomMeta(Box<dyn DynCustomMeta>);
impl CustomMeta {
    pub fn new<T: CustomMetaEvent + Clone + PartialEq>(event: T) -> CustomMeta {
        CustomMeta(Box::new(event))
    }

    pub fn get(&self) -> &dyn DynCustomMeta {
        &*self.0
    }

    pub fn get_mut(&mut self) -> &mut dyn DynCustomMeta {
        &mut *self.0
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}
impl Clone for CustomMeta {
    fn clone(&self) -> CustomMeta {
        CustomMeta(self.0.clone_box())
    }
}
impl PartialEq for CustomMeta {
    fn eq(&self, other: &CustomMeta) -> bool {
        self.0.eq_dyn(&*other.0)
    }
}
impl fmt::Debug for CustomMeta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// An owned custom chunk.
pub struct CustomChunkBox(Box<dyn DynCustomChunk>);
impl CustomChunkBox {
    pub fn new<T: CustomChunk + Clone + PartialEq>(chunk: T) -> CustomChunkBox {
        CustomChunkBox(Box::new(chunk))
    }

    pub fn get(&self) -> &dyn DynCustomChunk {
        &*self.0
    }

    pub fn get_mut(&mut self) -> &mut dyn DynCustomChunk {
        &mut *self.0
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}
impl Clone for CustomChunkBox {
    fn clone(&self) -> CustomChunkBox {
        CustomChunkBox(self.0.clone_box())
    }
}
impl PartialEq for CustomChunkBox {
    fn eq(&self, other: &CustomChunkBox) -> bool {
        self.0.eq_dyn(&*other.0)
    }
}
impl fmt::Debug for CustomChunkBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

type MetaFactory = fn() -> Box<dyn DynCustomMeta>;
type ChunkFactory = fn() -> Box<dyn DynCustomChunk>;

fn make_meta<T: CustomMetaEvent + Default + Clone + PartialEq>() -> Box<dyn DynCustomMeta> {
    Box::new(T::default())
}
fn make_chunk<T: CustomChunk + Default + Clone + PartialEq>() -> Box<dyn DynCustomChunk> {
    Box::new(T::default())
}

/// Bidirectional mapping between custom meta event types and meta type bytes.
#[derive(Clone, Default)]
pub struct EventTypesCollection {
    by_status: HashMap<u8, (TypeId, MetaFactory)>,
    by_type: HashMap<TypeId, u8>,
}
impl EventTypesCollection {
    pub fn new() -> EventTypesCollection {
        EventTypesCollection::default()
    }

    /// Register `T` under the given meta type byte.
    ///
    /// Any previous mapping of either the type or the byte is replaced.
    pub fn add<T>(&mut self, status: u8) -> &mut Self
    where
        T: CustomMetaEvent + Default + Clone + PartialEq,
    {
        let type_id = TypeId::of::<T>();
        if let Some(old_status) = self.by_type.remove(&type_id) {
            self.by_status.remove(&old_status);
        }
        if let Some((old_type, _)) = self.by_status.remove(&status) {
            self.by_type.remove(&old_type);
        }
        self.by_status.insert(status, (type_id, make_meta::<T> as MetaFactory));
        self.by_type.insert(type_id, status);
        self
    }

    pub fn len(&self) -> usize {
        self.by_status.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_status.is_empty()
    }

    pub fn status_byte_of<T: 'static>(&self) -> Option<u8> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub(crate) fn status_byte(&self, event: &CustomMeta) -> Option<u8> {
        self.by_type
            .get(&Any::type_id(event.get().as_any()))
            .copied()
    }

    pub(crate) fn create(&self, status: u8) -> Option<Box<dyn DynCustomMeta>> {
        self.by_status.get(&status).map(|(_, factory)| factory())
    }
}
impl fmt::Debug for EventTypesCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.by_status.keys()).finish()
    }
}

/// Bidirectional mapping between custom chunk types and chunk ids.
#[derive(Clone, Default)]
pub struct ChunkTypesCollection {
    by_id: HashMap<ChunkId, (TypeId, ChunkFactory)>,
    by_type: HashMap<TypeId, ChunkId>,
}
impl ChunkTypesCollection {
    pub fn new() -> ChunkTypesCollection {
        ChunkTypesCollection::default()
    }

    /// Register `T` under the given chunk id.
    ///
    /// Any previous mapping of either the type or the id is replaced.
    pub fn add<T>(&mut self, id: ChunkId) -> &mut Self
    where
        T: CustomChunk + Default + Clone + PartialEq,
    {
        let type_id = TypeId::of::<T>();
        if let Some(old_id) = self.by_type.remove(&type_id) {
            self.by_id.remove(&old_id);
        }
        if let Some((old_type, _)) = self.by_id.remove(&id) {
            self.by_type.remove(&old_type);
        }
        self.by_id.insert(id, (type_id, make_chunk::<T> as ChunkFactory));
        self.by_type.insert(type_id, id);
        self
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn id_of<T: 'static>(&self) -> Option<ChunkId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub(crate) fn chunk_id(&self, chunk: &CustomChunkBox) -> Option<ChunkId> {
        self.by_type
            .get(&Any::type_id(chunk.get().as_any()))
            .copied()
    }

    pub(crate) fn create(&self, id: ChunkId) -> Option<Box<dyn DynCustomChunk>> {
        self.by_id.get(&id).map(|(_, factory)| factory())
    }
}
impl fmt::Debug for ChunkTypesCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.by_id.keys()).finish()
    }
}

/// Counts how many bytes a custom `write_content` produced.
struct CountingWrite<'a, W: io::Write + ?Sized> {
    inner: &'a mut W,
    count: usize,
}
impl<W: io::Write + ?Sized> io::Write for CountingWrite<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n;
        Ok(n)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Run a custom `write_content`, checking it agrees with its declared `content_size`.
pub(crate) fn write_checked<W, F>(out: &mut W, declared: usize, write: F) -> Result<()>
where
    W: io::Write + ?Sized,
    F: FnOnce(&mut dyn io::Write) -> Result<()>,
{
    let mut counter = CountingWrite {
        inner: out,
        count: 0,
    };
    write(&mut counter)?;
    ensure!(
        counter.count == declared,
        Error::InvalidOperation("custom content size differs from the amount of bytes written")
    );
    Ok(())
}

impl CustomMeta {
    pub(crate) fn from_box(event: Box<dyn DynCustomMeta>) -> CustomMeta {
        CustomMeta(event)
    }
}
impl CustomChunkBox {
    pub(crate) fn from_box(chunk: Box<dyn DynCustomChunk>) -> CustomChunkBox {
        CustomChunkBox(chunk)
    }
}
