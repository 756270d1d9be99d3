// End-to-end session flow against a scripted in-memory transport:
// host a session, edit lines, diff-and-push, structural changes with
// activity-log rebasing, pull-and-merge, leave.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use cuesync_client::session::SessionClient;
use cuesync_client::transport::SyncTransport;
use cuesync_common::protocol::{
    DeleteLinesRequest, GetOriginalSubtitleResponse, GetSubtitleRequest, GetSubtitleResponse,
    GetUpdatesRequest, GetUpdatesResponse, InsertLineRequest, JoinRequest, JoinResponse,
    LeaveRequest, SendMessageRequest, StartRequest, StartResponse, UpdateLineRequest, WireUpdate,
    WireUser, MSG_OK,
};
use cuesync_common::types::{CueLine, UpdateAction};

#[derive(Default)]
struct ScriptedTransport {
    updates_responses: Mutex<VecDeque<GetUpdatesResponse>>,
    pushed_updates: Mutex<Vec<UpdateLineRequest>>,
    pushed_inserts: Mutex<Vec<InsertLineRequest>>,
    pushed_deletes: Mutex<Vec<DeleteLinesRequest>>,
    leaves: Mutex<Vec<LeaveRequest>>,
}

#[async_trait]
impl SyncTransport for ScriptedTransport {
    async fn start(&self, request: &StartRequest) -> Result<StartResponse> {
        Ok(StartResponse {
            user: Some(WireUser {
                user_name: request.user_name.clone(),
                ip: "127.0.0.1".to_string(),
                last_activity: chrono::Utc::now(),
            }),
            message: MSG_OK.to_string(),
        })
    }

    async fn join(&self, _request: &JoinRequest) -> Result<JoinResponse> {
        Err(anyhow!("not scripted"))
    }

    async fn leave(&self, request: &LeaveRequest) -> Result<()> {
        self.leaves.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn get_subtitle(&self, _request: &GetSubtitleRequest) -> Result<GetSubtitleResponse> {
        Err(anyhow!("not scripted"))
    }

    async fn get_original_subtitle(
        &self,
        _request: &GetSubtitleRequest,
    ) -> Result<GetOriginalSubtitleResponse> {
        Ok(GetOriginalSubtitleResponse { subtitle: vec![] })
    }

    async fn get_updates(&self, _request: &GetUpdatesRequest) -> Result<GetUpdatesResponse> {
        self.updates_responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("not scripted"))
    }

    async fn send_message(&self, _request: &SendMessageRequest) -> Result<bool> {
        Ok(true)
    }

    async fn update_line(&self, request: &UpdateLineRequest) -> Result<bool> {
        self.pushed_updates.lock().unwrap().push(request.clone());
        Ok(true)
    }

    async fn insert_line(&self, request: &InsertLineRequest) -> Result<bool> {
        self.pushed_inserts.lock().unwrap().push(request.clone());
        Ok(true)
    }

    async fn delete_lines(&self, request: &DeleteLinesRequest) -> Result<bool> {
        self.pushed_deletes.lock().unwrap().push(request.clone());
        Ok(true)
    }
}

fn document() -> Vec<CueLine> {
    vec![
        CueLine::new(0.0, 900.0, "Welcome."),
        CueLine::new(1000.0, 1900.0, "This is the second cue."),
        CueLine::new(2000.0, 2900.0, "And the third."),
        CueLine::new(3000.0, 3900.0, "Fourth and last."),
    ]
}

#[tokio::test]
async fn full_session_flow_pushes_rebases_and_merges() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = SessionClient::new(transport.clone(), document(), None);

    // Host the session.
    let message = client
        .start_server("http://sync.test/api", "movie-night", "mara", "movie.srt")
        .await
        .expect("start");
    assert_eq!(message, MSG_OK);

    // Local edit, detected and pushed by the diff step.
    client
        .edit_line(1, CueLine::new(1000.0, 1900.0, "This is the\nsecond cue."))
        .expect("edit");
    let pushed = client.check_for_and_submit_updates().await.expect("diff");
    assert_eq!(pushed, 1);
    {
        let sent = transport.pushed_updates.lock().unwrap();
        assert_eq!(sent[0].index, 1);
        assert_eq!(sent[0].sequence.text, "This is the<br />second cue.");
    }
    assert_eq!(client.activity_log().len(), 1);

    // Structural insert shifts the logged entry right.
    client
        .insert_line(0, CueLine::new(0.0, 400.0, "(intro)"))
        .await
        .expect("insert");
    assert_eq!(client.working_lines().len(), 5);
    let indices: Vec<usize> = client.activity_log().iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![2]);

    // Deleting that line removes its entry again.
    client.delete_lines(&[2]).await.expect("delete");
    assert!(client.activity_log().is_empty());
    assert_eq!(client.working_lines().len(), 4);

    // A remote edit arrives: pull advances the watermark, the merge
    // applies it to both snapshots without it reading as a local change.
    transport.updates_responses.lock().unwrap().push_back(GetUpdatesResponse {
        updates: vec![WireUpdate {
            user_name: "ben".to_string(),
            index: 0,
            start: 0,
            end: 450,
            text: "(cold open)".to_string(),
            action: "update".to_string(),
            timestamp: 1_700_000_000_500,
        }],
        message: String::new(),
        new_update_time: 1_700_000_000_501,
        number_of_lines: 4,
    });

    let (updates, _message, line_count) = client.get_updates().await.expect("pull");
    assert_eq!(line_count, 4);
    for update in &updates {
        client.apply_remote_update(update);
    }
    assert_eq!(client.last_update_time(), 1_700_000_000_501);
    assert_eq!(client.working_lines()[0].text, "(cold open)");
    assert_eq!(client.baseline_lines()[0].text, "(cold open)");
    assert_eq!(client.activity_log().len(), 1);
    assert_eq!(client.activity_log()[0].user_name, "ben");
    assert_eq!(client.activity_log()[0].action, UpdateAction::Update);

    // The merged remote edit must not be re-pushed.
    let pushed = client.check_for_and_submit_updates().await.expect("diff after merge");
    assert_eq!(pushed, 0);

    // Leave tears down polling and notifies the service.
    client.leave().await;
    assert!(!client.is_polling());
    assert_eq!(transport.leaves.lock().unwrap().len(), 1);
    assert_eq!(transport.leaves.lock().unwrap()[0].user_name, "mara");
}
