/*
    Contact integration tests

    Two or three clients on one MemoryGraph:
    - alias validation before any write
    - proposal, acceptance echo and denial
    - direct messages, ordering, unread markers and latest preview
    - removal, re-adding and session reset
*/

use meshchat_core::core_chat::{ChatError, ContactState, ThreadKey};
use meshchat_core::core_crypto::PublicKey;
use meshchat_core::test_utils::TestNetwork;
use meshchat_core::ChatClient;

fn key_of(client: &ChatClient) -> PublicKey {
    client.identity().unwrap().public_key.clone()
}

#[tokio::test]
async fn test_add_contact_with_wrong_alias_writes_nothing() {
    let network = TestNetwork::new();
    let mut alice = network.join("alice").await;
    let bob = network.join("bob").await;
    let _carol = network.join("carol").await;

    let writes = network.graph.write_count();
    let err = alice.add_contact(&key_of(&bob), "carol").await.unwrap_err();

    assert!(matches!(err, ChatError::Validation(_)));
    assert_eq!(network.graph.write_count(), writes);
    alice.process_pending().await;
    assert!(alice.contacts().is_empty());
}

#[tokio::test]
async fn test_proposal_becomes_active_after_acceptance() {
    let network = TestNetwork::new();
    let mut alice = network.join("alice").await;
    let mut bob = network.join("bob").await;
    let bob_key = key_of(&bob);

    alice.add_contact(&bob_key, "bob").await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;

    assert_eq!(alice.contact(&bob_key).unwrap().state, ContactState::Invited);
    assert_eq!(bob.contact_invites().len(), 1);
    assert_eq!(bob.contact_invites()[0].inviter.display_name, "Alice");

    let invite_id = bob.contact_invites()[0].invite_id.clone();
    bob.accept_contact_invite(&invite_id).await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;

    assert!(bob.contact_invites().is_empty());
    assert_eq!(bob.contact(&key_of(&alice)).unwrap().state, ContactState::Active);
    assert_eq!(alice.contact(&bob_key).unwrap().state, ContactState::Active);
    assert_eq!(alice.contacts().len(), 1);
}

#[tokio::test]
async fn test_denied_contact_invite() {
    let network = TestNetwork::new();
    let mut alice = network.join("alice").await;
    let mut bob = network.join("bob").await;
    let bob_key = key_of(&bob);

    alice.add_contact(&bob_key, "bob").await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;

    let invite_id = bob.contact_invites()[0].invite_id.clone();
    bob.deny_contact_invite(&invite_id).await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;

    assert!(bob.contact_invites().is_empty());
    assert!(bob.contacts().is_empty());
    assert_eq!(alice.contact(&bob_key).unwrap().state, ContactState::Invited);
}

#[tokio::test]
async fn test_direct_messages_ordered_and_unread() {
    let network = TestNetwork::new();
    let mut alice = network.join("alice").await;
    let mut bob = network.join("bob").await;
    network.befriend(&mut alice, &mut bob).await;
    let alice_key = key_of(&alice);
    let bob_key = key_of(&bob);

    alice.send_contact_message(&bob_key, "one").await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;
    bob.send_contact_message(&alice_key, "two").await.unwrap();
    alice.send_contact_message(&bob_key, "three").await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;

    assert_eq!(bob.contact(&alice_key).unwrap().unread_count, 2);
    assert_eq!(alice.contact(&bob_key).unwrap().unread_count, 1);

    bob.load_contact_messages(&alice_key).await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;

    let thread: Vec<(&str, &str)> = bob
        .messages()
        .iter()
        .map(|message| (message.text.as_str(), message.sender_name.as_str()))
        .collect();
    assert_eq!(thread.len(), 3);
    assert!(thread.contains(&("one", "Alice")));
    assert!(thread.contains(&("two", "Bob")));
    assert!(thread.contains(&("three", "Alice")));
    assert!(bob
        .messages()
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    assert_eq!(bob.contact(&alice_key).unwrap().unread_count, 0);

    // While the thread is open new messages are read on arrival
    alice.send_contact_message(&bob_key, "four").await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;
    assert_eq!(bob.messages().last().unwrap().text, "four");
    assert_eq!(bob.contact(&alice_key).unwrap().unread_count, 0);
}

#[tokio::test]
async fn test_latest_preview_for_both_sides() {
    let network = TestNetwork::new();
    let mut alice = network.join("alice").await;
    let mut bob = network.join("bob").await;
    network.befriend(&mut alice, &mut bob).await;
    let alice_key = key_of(&alice);
    let bob_key = key_of(&bob);

    let none = alice
        .latest_preview(&ThreadKey::Contact(bob_key.clone()))
        .await
        .unwrap();
    assert!(none.is_none());

    alice.send_contact_message(&bob_key, "ping").await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;

    for (client, counterpart) in [(&alice, &bob_key), (&bob, &alice_key)] {
        let latest = client
            .latest_preview(&ThreadKey::Contact(counterpart.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.text, "ping");
        assert_eq!(latest.sender, alice_key);
    }
}

#[tokio::test]
async fn test_removed_contact_readded_with_new_incarnation() {
    let network = TestNetwork::new();
    let mut alice = network.join("alice").await;
    let mut bob = network.join("bob").await;
    network.befriend(&mut alice, &mut bob).await;
    let bob_key = key_of(&bob);

    let first = alice.contact(&bob_key).unwrap().incarnation.clone();
    alice.remove_contact(&bob_key).await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;
    assert!(alice.contacts().is_empty());

    alice.add_contact(&bob_key, "bob").await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;

    assert_eq!(alice.contacts().len(), 1);
    assert_ne!(alice.contact(&bob_key).unwrap().incarnation, first);
}

#[tokio::test]
async fn test_relogin_does_not_duplicate_entries() {
    let network = TestNetwork::new();
    let mut alice = network.join("alice").await;
    let mut bob = network.join("bob").await;
    network.befriend(&mut alice, &mut bob).await;

    let session = alice.current_session().unwrap().clone();
    alice.logout();
    assert!(matches!(
        alice.add_contact(&key_of(&bob), "bob").await,
        Err(ChatError::NotLoggedIn)
    ));

    let mut events = alice.subscribe();
    alice.login(session).await.unwrap();
    network.settle(&mut [&mut alice, &mut bob]).await;
    assert_eq!(alice.contacts().len(), 1);

    // One insertion, no echo of identical redeliveries
    let contact_events = meshchat_core::test_utils::drain_events(&mut events)
        .into_iter()
        .filter(|event| event.channel() == "contacts")
        .count();
    assert_eq!(contact_events, 1);
}

#[tokio::test]
async fn test_reset_disables_everything() {
    let network = TestNetwork::new();
    let mut alice = network.join("alice").await;
    let mut bob = network.join("bob").await;
    let mut carol = network.join("carol").await;
    network.befriend(&mut alice, &mut bob).await;
    carol.add_contact(&key_of(&alice), "alice").await.unwrap();
    alice.create_channel("C1").await.unwrap();
    network.settle(&mut [&mut alice, &mut bob, &mut carol]).await;
    assert_eq!(alice.contact_invites().len(), 1);

    alice.reset().await.unwrap();
    network.settle(&mut [&mut alice, &mut bob, &mut carol]).await;

    assert!(alice.contacts().is_empty());
    assert!(alice.channels().is_empty());
    assert!(alice.contact_invites().is_empty());
}

#[tokio::test]
async fn test_event_loop_applies_remote_invites() {
    let network = TestNetwork::new();
    let mut alice = network.join("alice").await;
    let mut bob = network.join("bob").await;

    alice.add_contact(&key_of(&bob), "bob").await.unwrap();

    // The loop never ends on its own while the session is alive
    let stopped = tokio::time::timeout(std::time::Duration::from_millis(100), bob.run()).await;
    assert!(stopped.is_err());
    assert_eq!(bob.contact_invites().len(), 1);
    assert_eq!(bob.contact_invites()[0].inviter.alias, "alice");
}
