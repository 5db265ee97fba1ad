//! Session links from the pasteboard, wallet connection and the status item.

use pretty_assertions::assert_eq;
use tokio::sync::oneshot::error::TryRecvError;

use wallet_agent::{
    action::Action,
    config::Config,
    domain::{
        auth::BiometricOutcome,
        request::{ExtensionMethod, ExtensionRequest, ExtensionResponse},
        wallet::{Account, Coin, EthereumChain, WalletId, WalletSelection},
    },
    infra::sessions::{ConnectError, ConnectedSession},
    surface::{Browser, Flow, FlowOutcome},
};

use super::{TestAgent, session_link};

const TOPIC: &str = "c9e6d30fb34afe70a15c14e9337ba8e4";

fn pick(chain: EthereumChain) -> FlowOutcome {
    FlowOutcome::WalletSelected(WalletSelection::new(
        chain,
        WalletId("main".to_string()),
        Account::ethereum("0x52908400098527886e0f7030069857d2e4169ee7"),
    ))
}

#[test]
fn test_session_link_connects_selected_wallet() {
    let mut t = TestAgent::unlocked();
    t.pasteboard.set(session_link(TOPIC));
    t.send(Action::Open);

    let (list, flow) = t.last_flow();
    assert_eq!(
        flow,
        Flow::AccountsList {
            selects_wallet: true,
            preferred_chain: None,
        }
    );

    t.finish(list, pick(EthereumChain::Gnosis));

    assert!(
        t.presenter
            .presented()
            .iter()
            .any(|(_, flow)| *flow == Flow::Connecting)
    );
    assert_eq!(
        t.sessions.connected(),
        vec![ConnectedSession {
            topic: TOPIC.to_string(),
            chain_id: 100,
            wallet_id: WalletId("main".to_string()),
        }]
    );
    assert_eq!(t.presenter.close_all_calls(), vec![None]);
    assert_eq!(t.agent.open_flows(), 0);
}

#[test]
fn test_connected_session_activates_configured_browser() {
    let config = Config {
        browser: Some(Browser::Firefox),
        ..Config::default()
    };
    let mut t = TestAgent::with_config(config, true);
    t.pasteboard.set(session_link(TOPIC));
    t.send(Action::Open);
    t.bio(BiometricOutcome::Success);

    let (list, _) = t.last_flow();
    t.finish(list, pick(EthereumChain::Ethereum));

    assert_eq!(t.presenter.close_all_calls(), vec![Some(Browser::Firefox)]);
}

#[test]
fn test_non_ethereum_selection_closes_without_connecting() {
    let mut t = TestAgent::unlocked();
    t.pasteboard.set(session_link(TOPIC));
    t.send(Action::Open);

    let (list, _) = t.last_flow();
    let mut selection = WalletSelection::new(
        EthereumChain::Ethereum,
        WalletId("sol".to_string()),
        Account::ethereum("4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T"),
    );
    if let Some(account) = selection.account.as_mut() {
        account.coin = Coin::Solana;
    }
    t.finish(list, FlowOutcome::WalletSelected(selection));

    assert!(t.sessions.connected().is_empty());
    assert_eq!(t.presenter.close_all_calls(), vec![None]);
}

#[test]
fn test_dismissed_account_picker_leaves_session_unconnected() {
    let mut t = TestAgent::unlocked();
    t.pasteboard.set(session_link(TOPIC));
    t.send(Action::Open);

    let (list, _) = t.last_flow();
    t.finish(list, FlowOutcome::Dismissed);

    assert!(t.sessions.connected().is_empty());
    assert!(t.presenter.visible().is_empty());
}

#[test]
fn test_connect_failure_shows_error() {
    let mut t = TestAgent::unlocked();
    t.sessions.fail_with(ConnectError::Expired(TOPIC.to_string()));
    t.pasteboard.set(session_link(TOPIC));
    t.send(Action::Open);

    let (list, _) = t.last_flow();
    t.finish(list, pick(EthereumChain::Ethereum));

    assert_eq!(
        t.last_flow().1,
        Flow::Error {
            message: format!("session {TOPIC} expired")
        }
    );
    assert!(
        !t.presenter
            .visible()
            .iter()
            .any(|(_, flow)| *flow == Flow::Connecting)
    );
    assert!(t.presenter.close_all_calls().is_empty());
}

#[test]
fn test_connected_session_leaves_pending_review_open() {
    let mut t = TestAgent::unlocked();
    let (request, mut rx) = ExtensionRequest::new(
        1,
        ExtensionMethod::SignMessage {
            data: "0xdeadbeef".to_string(),
        },
    )
    .with_address("0x52908400098527886e0f7030069857d2e4169ee7")
    .with_responder();
    t.send(Action::Extension(request));
    let (review, _) = t.last_flow();

    t.pasteboard.set(session_link(TOPIC));
    t.send(Action::Open);
    let (list, _) = t.last_flow();
    t.finish(list, pick(EthereumChain::Ethereum));

    assert_eq!(t.sessions.connected().len(), 1);
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(t.agent.open_flows(), 1);
    assert!(t.presenter.visible().iter().any(|(id, _)| *id == review));
    assert!(t.presenter.close_all_calls().is_empty());

    t.finish(review, FlowOutcome::MessageReviewed(false));
    assert_eq!(rx.try_recv(), Ok(ExtensionResponse::Cancelled));
    assert_eq!(t.presenter.close_all_calls(), vec![Some(Browser::Safari)]);
}

#[test]
fn test_session_link_chain_preselects_account_chain() {
    let mut t = TestAgent::unlocked();
    t.pasteboard.set(format!("{}&chainId=137", session_link(TOPIC)));
    t.send(Action::Open);

    assert_eq!(
        t.last_flow().1,
        Flow::AccountsList {
            selects_wallet: true,
            preferred_chain: Some(EthereumChain::Polygon),
        }
    );
}

#[test]
fn test_pasteboard_without_link_is_left_alone() {
    let mut t = TestAgent::unlocked();
    t.pasteboard.set("just some copied text");
    t.send(Action::Open);

    assert_eq!(
        t.last_flow().1,
        Flow::AccountsList {
            selects_wallet: false,
            preferred_chain: None,
        }
    );
}

#[test]
fn test_status_item_click() {
    let mut t = TestAgent::unlocked();
    t.send(Action::StatusItemClicked);
    assert_eq!(t.last_flow().1, Flow::StatusMenu);

    t.pasteboard.set(session_link(TOPIC));
    t.send(Action::StatusItemClicked);
    assert_eq!(
        t.last_flow().1,
        Flow::AccountsList {
            selects_wallet: true,
            preferred_chain: None,
        }
    );
}

#[test]
fn test_blocked_status_item_ignores_clicks() {
    let mut t = TestAgent::unlocked();
    t.pasteboard.set(session_link(TOPIC));
    t.send(Action::SetStatusItemBlocked(true));
    t.send(Action::StatusItemClicked);

    assert!(t.presenter.presented().is_empty());

    t.send(Action::SetStatusItemBlocked(false));
    t.send(Action::StatusItemClicked);
    assert_eq!(
        t.last_flow().1,
        Flow::AccountsList {
            selects_wallet: true,
            preferred_chain: None,
        }
    );
}

#[test]
fn test_quit_stops_agent() {
    let mut t = TestAgent::unlocked();
    assert!(!t.agent.should_quit());
    t.agent.handle().quit().unwrap();
    t.agent.settle();
    assert!(t.agent.should_quit());
}
