//! In-process fan-out of notification events to WebSocket connections.
//!
//! Every event is published once on a broadcast channel. Each connection
//! keeps the set of groups it joined at connect time (`user_{id}`,
//! `role_{role}`, `course_{id}`) and forwards only events addressed to one
//! of them within its own school.

use std::collections::HashSet;

use schoolhub_models::ids::SchoolId;
use tokio::sync::broadcast;
use tracing::debug;

use super::model::NotificationEvent;

/// Events buffered per subscriber before slow connections start lagging.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct HubMessage {
    pub school_id: Option<SchoolId>,
    pub event: NotificationEvent,
}

#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<HubMessage>,
}

impl NotificationHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Returns how many connections received the event.
    pub fn publish(&self, school_id: Option<SchoolId>, event: NotificationEvent) -> usize {
        let group = event.group.clone();
        let delivered = self
            .sender
            .send(HubMessage { school_id, event })
            .unwrap_or(0);
        debug!(group = %group, delivered, "Notification published");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubMessage> {
        self.sender.subscribe()
    }

    pub fn connections(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Groups one connection belongs to.
#[derive(Debug, Clone)]
pub struct Membership {
    pub school_id: Option<SchoolId>,
    pub groups: HashSet<String>,
}

impl Membership {
    pub fn accepts(&self, message: &HubMessage) -> bool {
        let same_school = match (self.school_id, message.school_id) {
            (Some(own), Some(target)) => own == target,
            // system admins see everything; global events reach everyone
            _ => true,
        };
        same_school && self.groups.contains(&message.event.group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(group: &str) -> NotificationEvent {
        NotificationEvent {
            group: group.to_string(),
            notification_id: None,
            title: "Exam moved".into(),
            message: "Now on Friday".into(),
            notification_type: "general".into(),
            link: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe();

        assert_eq!(hub.publish(None, event("role_student")), 1);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event.group, "role_student");
    }

    #[test]
    fn test_publish_without_connections_is_fine() {
        let hub = NotificationHub::new();
        assert_eq!(hub.connections(), 0);
        assert_eq!(hub.publish(None, event("user_x")), 0);
    }

    #[test]
    fn test_membership_filters_group_and_school() {
        let school = SchoolId::new();
        let membership = Membership {
            school_id: Some(school),
            groups: HashSet::from(["role_teacher".to_string()]),
        };

        let ours = HubMessage {
            school_id: Some(school),
            event: event("role_teacher"),
        };
        let other_school = HubMessage {
            school_id: Some(SchoolId::new()),
            event: event("role_teacher"),
        };
        let other_group = HubMessage {
            school_id: Some(school),
            event: event("role_student"),
        };

        assert!(membership.accepts(&ours));
        assert!(!membership.accepts(&other_school));
        assert!(!membership.accepts(&other_group));
    }
}
