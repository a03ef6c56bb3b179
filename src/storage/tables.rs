use redb::TableDefinition;

/// Media records: name -> MediaRecord (msgpack)
pub const MEDIA: TableDefinition<&str, &[u8]> = TableDefinition::new("media");
