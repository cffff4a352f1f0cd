//! End-to-end pipeline tests: scripted stream → dispatcher → schema registry
//! → codec → writers → cursor store.

use std::sync::Arc;
use std::time::Duration;

use ember::{
    selector_of, Backoff, ChainStream, Cursor, CursorStore, CursorStoreConfig, DispatcherConfig,
    EventSchemaRegistry, Felt, FilterBuilder, IndexerDispatcher, Network, SharedFilter,
};
use ember_test_utils::{
    block, data_msg, event, header, short_string, system_msg, u256_parts, MemoryDaoStore,
    MemoryLaunchpadStore, MemoryNameserviceStore, Script, ScriptedStream,
};
use tokio_util::sync::CancellationToken;

async fn cursor_store(path: &std::path::Path) -> CursorStore {
    CursorStore::connect(CursorStoreConfig {
        url: path.to_string_lossy().to_string(),
    })
    .await
    .unwrap()
}

fn test_config(indexer_id: &str) -> DispatcherConfig {
    let mut config = DispatcherConfig::new(indexer_id, Network::StarknetSepolia);
    config.decimals = 6;
    config.read_timeout = Duration::from_secs(5);
    config.reconnect_backoff = Backoff::new(
        Duration::from_millis(1),
        Duration::from_millis(5),
        2.0,
    );
    config
}

/// CreateLaunch event with the canonical test payload.
fn launch_event(tx: u64, index: u64) -> ember::RawEvent {
    let selector = selector_of("CreateLaunch").unwrap();
    let mut data = Vec::new();
    data.extend(u256_parts(1_000_000)); // amount
    data.extend(u256_parts(500_000)); // price
    data.extend(u256_parts(100_000_000)); // total supply
    data.extend(u256_parts(0)); // slope
    data.extend(u256_parts(0)); // threshold liquidity
    data.push(short_string("linear"));

    event(
        Felt::from(0x1000u64),
        vec![
            selector,
            Felt::from(0xcau64),
            Felt::from(0x70u64),
            Felt::from(0x71u64),
        ],
        data,
        Felt::from(tx),
        index,
    )
}

fn launchpad_registry(store: Arc<MemoryLaunchpadStore>) -> EventSchemaRegistry {
    let mut registry = EventSchemaRegistry::new();
    ember_launchpad::register(&mut registry, store).unwrap();
    registry
}

async fn run_dispatcher(
    config: DispatcherConfig,
    scripts: Vec<Script>,
    registry: EventSchemaRegistry,
    cursors: CursorStore,
    filter: SharedFilter,
) -> (ember::DispatchStats, Arc<ScriptedStream>) {
    let shutdown = CancellationToken::new();
    let stream = Arc::new(ScriptedStream::new(scripts).cancel_when_exhausted(shutdown.clone()));
    let stream_dyn: Arc<dyn ChainStream> = stream.clone();

    let dispatcher =
        IndexerDispatcher::new(config, stream_dyn, registry, cursors, filter, shutdown);
    let stats = dispatcher.run().await.unwrap();
    (stats, stream)
}

#[tokio::test]
async fn create_launch_end_to_end_with_redelivery() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cursor.db");

    let store = Arc::new(MemoryLaunchpadStore::new());
    let registry = launchpad_registry(store.clone());

    // The same block is delivered twice, as a reconnect-from-cursor would.
    let scripts = vec![
        vec![data_msg(vec![block(header(100, 1_700_000_000), vec![launch_event(0xdead, 0)])])],
        vec![data_msg(vec![block(header(100, 1_700_000_000), vec![launch_event(0xdead, 0)])])],
    ];

    let (stats, _) = run_dispatcher(
        test_config("launchpad"),
        scripts,
        registry,
        cursor_store(&db).await,
        SharedFilter::new(FilterBuilder::new().build()),
    )
    .await;

    // Exactly one row despite redelivery.
    let launches = store.launches.lock().unwrap();
    assert_eq!(launches.len(), 1);
    let (ctx, launch) = &launches[0];
    assert_eq!(launch.amount, "1.000000");
    assert_eq!(launch.price, "0.500000");
    assert_eq!(launch.total_supply, "100.000000");
    assert_eq!(launch.bonding_type, "linear");
    assert_eq!(ctx.block_number, 100);

    assert_eq!(stats.written, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 0);

    // Cursor sits at the last fully-processed block.
    let committed = cursor_store(&db).await.load("launchpad").await.unwrap();
    assert_eq!(committed.unwrap().block_number, 100);
}

#[tokio::test]
async fn unknown_selector_is_skipped_and_cursor_advances() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cursor.db");

    let store = Arc::new(MemoryLaunchpadStore::new());
    let registry = launchpad_registry(store.clone());

    let unknown = event(
        Felt::from(0x1000u64),
        vec![selector_of("SomethingUntracked").unwrap()],
        vec![],
        Felt::from(0x1u64),
        0,
    );
    let scripts = vec![vec![data_msg(vec![block(
        header(200, 1_700_000_000),
        vec![unknown, launch_event(0x2, 1)],
    )])]];

    let (stats, _) = run_dispatcher(
        test_config("launchpad"),
        scripts,
        registry,
        cursor_store(&db).await,
        SharedFilter::new(FilterBuilder::new().build()),
    )
    .await;

    assert_eq!(stats.unknown_selectors, 1);
    assert_eq!(stats.written, 1);
    assert_eq!(store.launches.lock().unwrap().len(), 1);

    let committed = cursor_store(&db).await.load("launchpad").await.unwrap();
    assert_eq!(committed.unwrap().block_number, 200);
}

#[tokio::test]
async fn malformed_event_never_aborts_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cursor.db");

    let store = Arc::new(MemoryLaunchpadStore::new());
    let registry = launchpad_registry(store.clone());

    // CreateLaunch with a truncated payload: no variant matches.
    let malformed = event(
        Felt::from(0x1000u64),
        vec![
            selector_of("CreateLaunch").unwrap(),
            Felt::from(0x1u64),
            Felt::from(0x2u64),
            Felt::from(0x3u64),
        ],
        vec![Felt::from(1u64); 3],
        Felt::from(0x9u64),
        0,
    );
    let scripts = vec![vec![data_msg(vec![block(
        header(300, 1_700_000_000),
        vec![malformed, launch_event(0xa, 1)],
    )])]];

    let (stats, _) = run_dispatcher(
        test_config("launchpad"),
        scripts,
        registry,
        cursor_store(&db).await,
        SharedFilter::new(FilterBuilder::new().build()),
    )
    .await;

    assert_eq!(stats.decode_failures, 1);
    assert_eq!(stats.written, 1);

    let committed = cursor_store(&db).await.load("launchpad").await.unwrap();
    assert_eq!(committed.unwrap().block_number, 300);
}

#[tokio::test]
async fn write_failure_is_logged_and_does_not_stall_progress() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cursor.db");

    let store = Arc::new(MemoryLaunchpadStore::new());
    store.fail_next();
    let registry = launchpad_registry(store.clone());

    let scripts = vec![vec![data_msg(vec![block(
        header(400, 1_700_000_000),
        vec![launch_event(0xb, 0)],
    )])]];

    let (stats, _) = run_dispatcher(
        test_config("launchpad"),
        scripts,
        registry,
        cursor_store(&db).await,
        SharedFilter::new(FilterBuilder::new().build()),
    )
    .await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.written, 0);
    assert!(store.launches.lock().unwrap().is_empty());

    // Accepted policy: skip-and-continue with the failure in logs and stats.
    let committed = cursor_store(&db).await.load("launchpad").await.unwrap();
    assert_eq!(committed.unwrap().block_number, 400);
}

#[tokio::test]
async fn cursor_is_monotonic_across_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cursor.db");

    let store = Arc::new(MemoryLaunchpadStore::new());
    let registry = launchpad_registry(store.clone());

    let scripts = vec![vec![
        system_msg("stream healthy"),
        data_msg(vec![
            block(header(500, 1_700_000_000), vec![launch_event(0x1, 0)]),
            block(header(501, 1_700_000_012), vec![]),
            block(header(502, 1_700_000_024), vec![launch_event(0x2, 0)]),
        ]),
    ]];

    let (stats, _) = run_dispatcher(
        test_config("launchpad"),
        scripts,
        registry,
        cursor_store(&db).await,
        SharedFilter::new(FilterBuilder::new().build()),
    )
    .await;

    assert_eq!(stats.blocks, 3);
    assert_eq!(stats.written, 2);

    let committed = cursor_store(&db).await.load("launchpad").await.unwrap();
    assert_eq!(committed.unwrap().block_number, 502);
}

#[tokio::test]
async fn restart_resumes_from_committed_cursor_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cursor.db");

    let store = Arc::new(MemoryLaunchpadStore::new());

    // First run: process block 100, then stop.
    let scripts = vec![vec![data_msg(vec![block(
        header(100, 1_700_000_000),
        vec![launch_event(0xdead, 0)],
    )])]];
    let (stats, _) = run_dispatcher(
        test_config("launchpad"),
        scripts,
        launchpad_registry(store.clone()),
        cursor_store(&db).await,
        SharedFilter::new(FilterBuilder::new().build()),
    )
    .await;
    assert_eq!(stats.written, 1);

    // Second run: the stream replays from the committed cursor; the same
    // block comes again.
    let scripts = vec![vec![data_msg(vec![block(
        header(100, 1_700_000_000),
        vec![launch_event(0xdead, 0)],
    )])]];
    let (stats, stream) = run_dispatcher(
        test_config("launchpad"),
        scripts,
        launchpad_registry(store.clone()),
        cursor_store(&db).await,
        SharedFilter::new(FilterBuilder::new().build()),
    )
    .await;

    // The restart subscribed from the persisted watermark.
    let subscriptions = stream.subscriptions();
    assert_eq!(
        subscriptions[0].1.as_ref().map(|c: &Cursor| c.block_number),
        Some(100)
    );

    // No gaps, no duplicate rows.
    assert_eq!(stats.written, 0);
    assert_eq!(stats.skipped, 1);
    assert_eq!(store.launches.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn launchpad_and_nameservice_share_one_indexer_process() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cursor.db");

    let launchpad_store = Arc::new(MemoryLaunchpadStore::new());
    let name_store = Arc::new(MemoryNameserviceStore::new());

    let mut registry = EventSchemaRegistry::new();
    ember_launchpad::register(&mut registry, launchpad_store.clone()).unwrap();
    ember_nameservice::register(&mut registry, name_store.clone()).unwrap();
    assert_eq!(registry.len(), 7);

    let username_claimed = event(
        Felt::from(0x2000u64),
        vec![
            selector_of("UsernameClaimed").unwrap(),
            Felt::from(0xabu64),
        ],
        vec![
            short_string("alice"),
            Felt::from(1_800_000_000u64),
            Felt::from(5_000_000u64),
            Felt::ZERO,
            Felt::from(0x70u64),
        ],
        Felt::from(0x20u64),
        0,
    );
    let scripts = vec![vec![data_msg(vec![block(
        header(700, 1_700_000_000),
        vec![username_claimed, launch_event(0x21, 1)],
    )])]];

    let (stats, _) = run_dispatcher(
        test_config("launchpad"),
        scripts,
        registry,
        cursor_store(&db).await,
        SharedFilter::new(FilterBuilder::new().build()),
    )
    .await;

    assert_eq!(stats.written, 2);
    let claims = name_store.claims.lock().unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].1.username, "alice");
    assert_eq!(claims[0].1.paid, "5.000000");
    assert_eq!(launchpad_store.launches.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn dao_factory_extends_live_filter_and_follows_children() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cursor.db");

    let factory = Felt::from(0xfac7u64);
    let dao_address = Felt::from(0xd0au64);

    let store = Arc::new(MemoryDaoStore::new());
    let filter = SharedFilter::new(FilterBuilder::new().contract(factory).build());

    let mut registry = EventSchemaRegistry::new();
    ember_dao::register(&mut registry, store.clone(), filter.clone()).unwrap();

    let dao_created = event(
        factory,
        vec![selector_of("DaoAACreated").unwrap(), dao_address],
        vec![Felt::from(0x1u64), Felt::from(0x2u64), Felt::from(0x3u64)],
        Felt::from(0x10u64),
        0,
    );
    let mut proposal_keys = vec![selector_of("ProposalCreated").unwrap()];
    proposal_keys.extend(u256_parts(1)); // proposal id
    let proposal_created = event(
        dao_address,
        proposal_keys,
        vec![
            Felt::from(0x1u64),           // owner
            Felt::from(1_700_000_000u64), // created at
            Felt::from(1_700_600_000u64), // end at
        ],
        Felt::from(0x11u64),
        0,
    );

    // Script 1 delivers the factory event; once the writer extends the
    // filter the dispatcher resubscribes and script 2 delivers the child
    // DAO's proposal.
    let scripts = vec![
        vec![data_msg(vec![block(header(10, 1_700_000_000), vec![dao_created])])],
        vec![data_msg(vec![block(header(11, 1_700_000_012), vec![proposal_created])])],
    ];

    let (stats, stream) = run_dispatcher(
        test_config("dao"),
        scripts,
        registry,
        cursor_store(&db).await,
        filter.clone(),
    )
    .await;

    assert_eq!(stats.written, 2);
    assert_eq!(store.daos.lock().unwrap().len(), 1);
    assert_eq!(store.proposals.lock().unwrap().len(), 1);

    // The resubscription carried the discovered DAO address.
    let subscriptions = stream.subscriptions();
    assert!(subscriptions.len() >= 2);
    assert!(!subscriptions[0].0.contracts.contains(&dao_address));
    assert!(subscriptions[1].0.contracts.contains(&dao_address));

    let proposal = &store.proposals.lock().unwrap()[0].1;
    assert_eq!(proposal.proposal_id, "1");
    assert!(proposal.dao.ends_with("d0a"));
}

#[tokio::test]
async fn shutdown_stops_between_blocks_with_cursor_at_last_complete_block() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cursor.db");

    let store = Arc::new(MemoryLaunchpadStore::new());
    let registry = launchpad_registry(store.clone());

    let shutdown = CancellationToken::new();
    // Cancelled before the run starts: the dispatcher must observe it at the
    // top of the streaming wait and exit without consuming anything.
    shutdown.cancel();

    let stream = Arc::new(ScriptedStream::new(vec![vec![data_msg(vec![block(
        header(600, 1_700_000_000),
        vec![launch_event(0x1, 0)],
    )])]]));
    let stream_dyn: Arc<dyn ChainStream> = stream.clone();

    let dispatcher = IndexerDispatcher::new(
        test_config("launchpad"),
        stream_dyn,
        registry,
        cursor_store(&db).await,
        SharedFilter::new(FilterBuilder::new().build()),
        shutdown,
    );
    let stats = dispatcher.run().await.unwrap();

    assert_eq!(stats.written, 0);
    assert_eq!(store.launches.lock().unwrap().len(), 0);
    let committed = cursor_store(&db).await.load("launchpad").await.unwrap();
    assert_eq!(committed, None);
}
