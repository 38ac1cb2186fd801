pub mod fetch;
pub mod ingest;
pub mod model;
pub mod parser;
pub mod poll;
pub mod projection;
pub mod resolver;
pub mod store;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
