// src/pipeline/sparkify.rs

//! The Sparkify warehouse load, wired in code:
//!
//! ```text
//! begin → {stage_events, stage_songs} → load_songplays_fact
//!       → {load_user_dim, load_song_dim, load_artist_dim, load_time_dim}
//!       → quality_gate → end
//! ```
//!
//! Every load appends; the quality gate depends on all four dimension loads
//! (and through them on the fact load), so no consumer of `end` ever sees a
//! run whose tables were not checked.

use std::sync::Arc;

use crate::dag::{DependencyGraph, GraphError, TaskSpec};
use crate::engine::retry::RetryPolicy;
use crate::exec::{Executor, LoadExecutor, NoopExecutor, QualityExecutor, StageExecutor};
use crate::storage::{CredentialProvider, S3Location};
use crate::types::LoadMode;
use crate::warehouse::WarehouseConnector;

use super::PipelineDefinition;

pub const PIPELINE_NAME: &str = "sparkify";

pub const BEGIN: &str = "begin";
pub const STAGE_EVENTS: &str = "stage_events";
pub const STAGE_SONGS: &str = "stage_songs";
pub const LOAD_SONGPLAYS: &str = "load_songplays_fact";
pub const LOAD_USERS: &str = "load_user_dim";
pub const LOAD_SONGS: &str = "load_song_dim";
pub const LOAD_ARTISTS: &str = "load_artist_dim";
pub const LOAD_TIME: &str = "load_time_dim";
pub const QUALITY_GATE: &str = "quality_gate";
pub const END: &str = "end";

/// Tables the quality gate checks by default.
pub const QUALITY_TABLES: [&str; 5] = ["songplays", "songs", "artists", "time", "users"];

/// `SELECT` bodies feeding the fact and dimension tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparkifyQueries {
    pub songplays: String,
    pub users: String,
    pub songs: String,
    pub artists: String,
    pub time: String,
}

impl Default for SparkifyQueries {
    fn default() -> Self {
        Self {
            songplays: "SELECT md5(events.sessionid || events.start_time) AS songplay_id, \
                 events.start_time, events.userid, events.level, songs.song_id, \
                 songs.artist_id, events.sessionid, events.location, events.useragent \
                 FROM (SELECT TIMESTAMP 'epoch' + ts/1000 * interval '1 second' AS start_time, * \
                       FROM staging_events WHERE page = 'NextSong') events \
                 LEFT JOIN staging_songs songs \
                 ON events.song = songs.title AND events.artist = songs.artist_name \
                 AND events.length = songs.duration"
                .to_string(),
            users: "SELECT DISTINCT userid, firstname, lastname, gender, level \
                 FROM staging_events WHERE page = 'NextSong'"
                .to_string(),
            songs: "SELECT DISTINCT song_id, title, artist_id, year, duration FROM staging_songs"
                .to_string(),
            artists: "SELECT DISTINCT artist_id, artist_name, artist_location, \
                 artist_latitude, artist_longitude FROM staging_songs"
                .to_string(),
            time: "SELECT start_time, extract(hour from start_time), extract(day from start_time), \
                 extract(week from start_time), extract(month from start_time), \
                 extract(year from start_time), extract(dayofweek from start_time) \
                 FROM songplays"
                .to_string(),
        }
    }
}

/// Everything the fixed wiring needs from the outside world.
#[derive(Debug, Clone)]
pub struct SparkifyParams {
    pub connector: Arc<dyn WarehouseConnector>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub events: S3Location,
    pub songs: S3Location,
    pub queries: SparkifyQueries,
    pub quality_tables: Vec<String>,
    pub retry: RetryPolicy,
}

impl SparkifyParams {
    /// Udacity's public buckets and the default queries.
    pub fn new(
        connector: Arc<dyn WarehouseConnector>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            connector,
            credentials,
            events: S3Location::new("s3://udacity-dend", "log_data")
                .with_json_path("s3://udacity-dend/log_json_path.json"),
            songs: S3Location::new("s3://udacity-dend", "song_data"),
            queries: SparkifyQueries::default(),
            quality_tables: QUALITY_TABLES.iter().map(|t| t.to_string()).collect(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Build the Sparkify pipeline.
pub fn sparkify(params: SparkifyParams) -> Result<PipelineDefinition, GraphError> {
    let SparkifyParams {
        connector,
        credentials,
        events,
        songs,
        queries,
        quality_tables,
        retry,
    } = params;

    let noop: Arc<dyn Executor> = Arc::new(NoopExecutor);
    let stage = |location: S3Location| -> Arc<dyn Executor> {
        Arc::new(StageExecutor::new(location, credentials.clone(), connector.clone()))
    };
    let load = |query: String| -> Arc<dyn Executor> {
        Arc::new(LoadExecutor::new(query, connector.clone()))
    };

    let mut graph = DependencyGraph::new();
    let add = |graph: &mut DependencyGraph,
               id: &str,
               executor: Arc<dyn Executor>,
               table: Option<&str>|
     -> Result<(), GraphError> {
        let mut builder = TaskSpec::builder(id, executor).retry(retry);
        if let Some(table) = table {
            builder = builder.target_table(table).load_mode(LoadMode::Append);
        }
        graph.add_task(builder.build()?)
    };

    add(&mut graph, BEGIN, noop.clone(), None)?;
    add(&mut graph, STAGE_EVENTS, stage(events), Some("staging_events"))?;
    add(&mut graph, STAGE_SONGS, stage(songs), Some("staging_songs"))?;
    add(&mut graph, LOAD_SONGPLAYS, load(queries.songplays), Some("songplays"))?;
    add(&mut graph, LOAD_USERS, load(queries.users), Some("users"))?;
    add(&mut graph, LOAD_SONGS, load(queries.songs), Some("songs"))?;
    add(&mut graph, LOAD_ARTISTS, load(queries.artists), Some("artists"))?;
    add(&mut graph, LOAD_TIME, load(queries.time), Some("time"))?;
    add(
        &mut graph,
        QUALITY_GATE,
        Arc::new(QualityExecutor::new(quality_tables, connector.clone())),
        None,
    )?;
    add(&mut graph, END, noop, None)?;

    let dimensions = [LOAD_USERS, LOAD_SONGS, LOAD_ARTISTS, LOAD_TIME];
    for staging in [STAGE_EVENTS, STAGE_SONGS] {
        graph.add_dependency(BEGIN, staging)?;
        graph.add_dependency(staging, LOAD_SONGPLAYS)?;
    }
    for dimension in dimensions {
        graph.add_dependency(LOAD_SONGPLAYS, dimension)?;
        graph.add_dependency(dimension, QUALITY_GATE)?;
    }
    graph.add_dependency(QUALITY_GATE, END)?;

    Ok(PipelineDefinition::new(PIPELINE_NAME, graph))
}
