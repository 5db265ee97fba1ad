//! Extension requests: classification, review flows and the approval
//! challenges behind them.

use pretty_assertions::assert_eq;
use tokio::sync::oneshot::{self, error::TryRecvError};

use wallet_agent::{
    action::Action,
    config::Config,
    domain::{
        auth::{ApprovalSubject, AuthenticationReason, BiometricOutcome},
        request::{ExtensionMethod, ExtensionRequest, ExtensionResponse, PeerMeta},
        wallet::{Account, EthereumChain, Transaction, WalletId, WalletSelection},
    },
    surface::{Browser, Flow, FlowOutcome},
};

use super::TestAgent;

const ADDRESS: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

type Response = oneshot::Receiver<ExtensionResponse>;

fn sign_personal(id: u64) -> (ExtensionRequest, Response) {
    ExtensionRequest::new(
        id,
        ExtensionMethod::SignPersonalMessage {
            data: "0x68656c6c6f".to_string(),
        },
    )
    .with_address(ADDRESS)
    .with_responder()
}

fn transfer() -> Transaction {
    Transaction {
        from: ADDRESS.to_string(),
        to: Some("0x8617e340b3d01fa5f11f306f4090fd50e238070d".to_string()),
        value: Some("0xde0b6b3a7640000".to_string()),
        ..Transaction::default()
    }
}

fn send_transaction(id: u64) -> ExtensionRequest {
    ExtensionRequest::new(
        id,
        ExtensionMethod::SendTransaction {
            transaction: transfer(),
        },
    )
    .with_address(ADDRESS)
}

#[test]
fn test_request_accounts_answers_with_selection() {
    let mut t = TestAgent::unlocked();
    let (request, mut rx) =
        ExtensionRequest::new(1, ExtensionMethod::RequestAccounts).with_responder();
    t.send(Action::Extension(request));

    let (list, flow) = t.last_flow();
    assert_eq!(
        flow,
        Flow::AccountsList {
            selects_wallet: true,
            preferred_chain: None,
        }
    );
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

    t.finish(
        list,
        FlowOutcome::WalletSelected(WalletSelection::new(
            EthereumChain::Polygon,
            WalletId("main".to_string()),
            Account::ethereum(ADDRESS),
        )),
    );

    assert_eq!(
        rx.try_recv(),
        Ok(ExtensionResponse::Accounts {
            chain_id: 137,
            addresses: vec![ADDRESS.to_string()],
        })
    );
    assert_eq!(t.presenter.close_all_calls(), vec![Some(Browser::Safari)]);
    assert_eq!(t.agent.open_flows(), 0);
}

#[test]
fn test_dismissed_account_picker_cancels() {
    let mut t = TestAgent::unlocked();
    let (request, mut rx) =
        ExtensionRequest::new(2, ExtensionMethod::SwitchEthereumChain { chain_id: 10 })
            .with_responder();
    t.send(Action::Extension(request));

    let (list, _) = t.last_flow();
    t.finish(list, FlowOutcome::Dismissed);

    assert_eq!(rx.try_recv(), Ok(ExtensionResponse::Cancelled));
    assert_eq!(t.presenter.close_all_calls(), vec![Some(Browser::Safari)]);
}

#[test]
fn test_approve_message_flow_shows_decoded_text() {
    let mut t = TestAgent::unlocked();
    let (mut request, _rx) = sign_personal(3);
    request.peer = PeerMeta {
        name: "Example".to_string(),
        ..PeerMeta::default()
    };
    t.send(Action::Extension(request));

    assert_eq!(
        t.last_flow().1,
        Flow::ApproveMessage {
            subject: ApprovalSubject::SignPersonalMessage,
            meta: "hello".to_string(),
            account: Account::ethereum(ADDRESS),
            peer: PeerMeta {
                name: "Example".to_string(),
                ..PeerMeta::default()
            },
        }
    );
}

#[test]
fn test_rejected_message_skips_challenge() {
    let mut t = TestAgent::unlocked();
    let (request, mut rx) = sign_personal(4);
    t.send(Action::Extension(request));

    let (review, _) = t.last_flow();
    t.finish(review, FlowOutcome::MessageReviewed(false));

    assert_eq!(rx.try_recv(), Ok(ExtensionResponse::Cancelled));
    assert_eq!(t.authenticator.prompts(), vec![AuthenticationReason::Start]);
    assert_eq!(t.authenticator.waiting(), 0);
}

#[test]
fn test_approved_message_waits_for_challenge() {
    let mut t = TestAgent::unlocked();
    let (request, mut rx) = sign_personal(5);
    t.send(Action::Extension(request));

    let (review, _) = t.last_flow();
    t.finish(review, FlowOutcome::MessageReviewed(true));

    assert_eq!(
        t.authenticator.prompts().last(),
        Some(&AuthenticationReason::SignPersonalMessage)
    );
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

    t.bio(BiometricOutcome::Success);
    assert_eq!(rx.try_recv(), Ok(ExtensionResponse::Approved));
}

#[test]
fn test_approved_transaction_failing_challenge_completes_with_none() {
    let mut t = TestAgent::unlocked();
    let (request, mut rx) = send_transaction(6).with_responder();
    t.send(Action::Extension(request));

    let (review, flow) = t.last_flow();
    assert!(matches!(
        flow,
        Flow::ApproveTransaction { chain: EthereumChain::Ethereum, .. }
    ));
    t.finish(review, FlowOutcome::TransactionReviewed(Some(transfer())));
    t.bio(BiometricOutcome::Failed);

    // Approval challenges never fall back to the password
    assert!(
        !t.presenter
            .presented()
            .iter()
            .any(|(_, flow)| matches!(flow, Flow::PasswordEntry { .. }))
    );
    assert_eq!(rx.try_recv(), Ok(ExtensionResponse::Cancelled));
    assert!(!t.agent.state().challenge_in_flight);
}

#[test]
fn test_approved_transaction_returns_reviewed_copy() {
    let mut t = TestAgent::unlocked();
    let (request, mut rx) = send_transaction(7).with_chain_id(42161).with_responder();
    t.send(Action::Extension(request));

    let (review, flow) = t.last_flow();
    assert!(matches!(
        flow,
        Flow::ApproveTransaction { chain: EthereumChain::Arbitrum, .. }
    ));

    let edited = Transaction {
        gas: Some("0x5208".to_string()),
        ..transfer()
    };
    t.finish(review, FlowOutcome::TransactionReviewed(Some(edited.clone())));
    assert_eq!(
        t.authenticator.prompts().last(),
        Some(&AuthenticationReason::SendTransaction)
    );
    t.bio(BiometricOutcome::Success);

    assert_eq!(
        rx.try_recv(),
        Ok(ExtensionResponse::Transaction {
            transaction: edited
        })
    );
}

#[test]
fn test_unserviceable_requests_answer_error() {
    let mut t = TestAgent::unlocked();

    let (unknown_chain, mut chain_rx) = send_transaction(8).with_chain_id(5).with_responder();
    t.send(Action::Extension(unknown_chain));
    let (no_address, mut address_rx) = ExtensionRequest::new(
        9,
        ExtensionMethod::SignTypedData {
            data: "{}".to_string(),
        },
    )
    .with_responder();
    t.send(Action::Extension(no_address));

    assert!(matches!(chain_rx.try_recv(), Ok(ExtensionResponse::Error { .. })));
    assert!(matches!(address_rx.try_recv(), Ok(ExtensionResponse::Error { .. })));
    assert!(t.presenter.presented().is_empty());
    assert_eq!(t.agent.open_flows(), 0);
}

#[test]
fn test_show_app_presents_plain_accounts() {
    let mut t = TestAgent::unlocked();
    t.send(Action::Extension(ExtensionRequest::new(10, ExtensionMethod::ShowApp)));

    assert_eq!(
        t.last_flow().1,
        Flow::AccountsList {
            selects_wallet: false,
            preferred_chain: None,
        }
    );
}

#[test]
fn test_approval_challenges_run_one_at_a_time() {
    let mut t = TestAgent::unlocked();
    let (first, mut first_rx) = sign_personal(11);
    let (second, mut second_rx) = sign_personal(12);
    t.send(Action::Extension(first));
    let (first_review, _) = t.last_flow();
    t.send(Action::Extension(second));
    let (second_review, _) = t.last_flow();

    t.finish(first_review, FlowOutcome::MessageReviewed(true));
    t.finish(second_review, FlowOutcome::MessageReviewed(true));

    assert_eq!(t.authenticator.prompts().len(), 2);
    assert_eq!(t.authenticator.waiting(), 1);

    t.bio(BiometricOutcome::Success);
    assert_eq!(first_rx.try_recv(), Ok(ExtensionResponse::Approved));
    assert_eq!(second_rx.try_recv(), Err(TryRecvError::Empty));

    // Queued challenge starts once the first one resolved
    assert_eq!(t.authenticator.prompts().len(), 3);
    t.bio(BiometricOutcome::Cancelled);
    assert_eq!(second_rx.try_recv(), Ok(ExtensionResponse::Cancelled));
    assert!(!t.agent.state().challenge_in_flight);
}

#[test]
fn test_return_to_browser_waits_for_open_reviews() {
    let mut t = TestAgent::unlocked();
    let (message, mut message_rx) = sign_personal(13);
    let (transaction, mut transaction_rx) = send_transaction(14).with_responder();
    t.send(Action::Extension(message));
    let (message_review, _) = t.last_flow();
    t.send(Action::Extension(transaction));
    let (transaction_review, _) = t.last_flow();

    t.send(Action::ReturnToBrowser(None));

    assert_eq!(message_rx.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(transaction_rx.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(t.agent.open_flows(), 2);
    assert_eq!(t.presenter.visible().len(), 2);
    assert!(t.presenter.close_all_calls().is_empty());

    // Answering one review still leaves the other in front
    t.finish(message_review, FlowOutcome::MessageReviewed(false));
    assert_eq!(message_rx.try_recv(), Ok(ExtensionResponse::Cancelled));
    assert!(t.presenter.close_all_calls().is_empty());

    t.finish(transaction_review, FlowOutcome::TransactionReviewed(None));
    assert_eq!(transaction_rx.try_recv(), Ok(ExtensionResponse::Cancelled));
    assert_eq!(t.presenter.close_all_calls(), vec![Some(Browser::Safari)]);
}

#[test]
fn test_queued_password_challenge_survives_earlier_completion() {
    let config = Config {
        biometrics: false,
        ..Config::default()
    };
    let mut t = TestAgent::unlocked_with(config);
    let (first, mut first_rx) = sign_personal(16);
    let (second, mut second_rx) = sign_personal(17);
    t.send(Action::Extension(first));
    let (first_review, _) = t.last_flow();
    t.send(Action::Extension(second));
    let (second_review, _) = t.last_flow();

    t.finish(first_review, FlowOutcome::MessageReviewed(true));
    let (first_password, flow) = t.last_flow();
    assert_eq!(
        flow,
        Flow::PasswordEntry {
            reason: AuthenticationReason::SignPersonalMessage
        }
    );
    t.finish(second_review, FlowOutcome::MessageReviewed(true));
    assert_eq!(t.last_flow().0, first_password);

    t.finish(first_password, FlowOutcome::PasswordEntered(true));
    assert_eq!(first_rx.try_recv(), Ok(ExtensionResponse::Approved));

    // The first completion asks for the browser while the second password
    // entry is up; it has to stay up and unanswered
    let (second_password, flow) = t.last_flow();
    assert_ne!(second_password, first_password);
    assert_eq!(
        flow,
        Flow::PasswordEntry {
            reason: AuthenticationReason::SignPersonalMessage
        }
    );
    assert_eq!(t.presenter.visible(), vec![(second_password, flow)]);
    assert_eq!(second_rx.try_recv(), Err(TryRecvError::Empty));
    assert!(t.agent.state().challenge_in_flight);
    assert!(t.presenter.close_all_calls().is_empty());

    t.finish(second_password, FlowOutcome::PasswordEntered(true));
    assert_eq!(second_rx.try_recv(), Ok(ExtensionResponse::Approved));
    assert!(!t.agent.state().challenge_in_flight);
    assert_eq!(t.presenter.close_all_calls(), vec![Some(Browser::Safari)]);
}

#[test]
fn test_extension_request_waits_for_unlock() {
    let mut t = TestAgent::new(true);
    t.send(Action::Open);

    let (request, mut rx) = sign_personal(15);
    t.send(Action::Extension(request));
    assert!(t.presenter.presented().is_empty());

    t.bio(BiometricOutcome::Success);
    let (review, flow) = t.last_flow();
    assert!(matches!(flow, Flow::ApproveMessage { .. }));

    t.finish(review, FlowOutcome::MessageReviewed(false));
    assert_eq!(rx.try_recv(), Ok(ExtensionResponse::Cancelled));
}
