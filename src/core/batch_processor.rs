//! Concurrent replay of command batches
//!
//! This module provides the `BatchProcessor`, which applies a batch of
//! [`LedgerCommand`]s to a shared [`Exchange`] with as much parallelism as the
//! batch allows while producing the same final state as applying it in order.
//!
//! # Partitioning
//!
//! Two commands depend on each other when they name a common user or a common
//! card id. The batch is split into the connected components of that relation
//! (union-find over users and cards). Commands inside a component keep their
//! file order and run sequentially; components run concurrently as tokio tasks.
//!
//! Commands with no participants (`sweep`) touch the whole registry, so they
//! act as barriers: everything before them finishes first, then they run
//! alone.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, warn};

use super::Exchange;
use crate::types::{ExchangeError, LedgerCommand, UserId};

/// Result of applying a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The command that was applied
    pub command: LedgerCommand,

    /// Outcome of applying it
    pub result: Result<(), ExchangeError>,
}

impl ProcessingResult {
    /// Apply `command` to `exchange`, logging a failure
    pub fn apply(exchange: &Exchange, command: LedgerCommand) -> Self {
        let result = exchange.process(command.clone());
        if let Err(err) = &result {
            warn!(op = command.name(), error = %err, "command failed");
        }
        Self { command, result }
    }
}

#[derive(Debug, Hash, PartialEq, Eq)]
enum Node<'a> {
    User(UserId),
    Card(&'a str),
}

#[derive(Debug, Default)]
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn add(&mut self) -> usize {
        self.parent.push(self.parent.len());
        self.parent.len() - 1
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[b] = a;
        }
    }
}

/// Batch processor with dependency-based partitioning
///
/// Cheap to clone; clones share the exchange.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    exchange: Arc<Exchange>,
}

impl BatchProcessor {
    pub fn new(exchange: Arc<Exchange>) -> Self {
        Self { exchange }
    }

    /// Split commands into independent groups
    ///
    /// Groups are returned in order of their first command; each group keeps
    /// the original relative order of its commands.
    pub fn partition(batch: Vec<LedgerCommand>) -> Vec<Vec<LedgerCommand>> {
        let roots = {
            let mut sets = DisjointSets::default();
            let mut nodes: HashMap<Node<'_>, usize> = HashMap::new();
            let mut anchors = Vec::with_capacity(batch.len());

            for command in &batch {
                let anchor = sets.add();
                let users = command.participants().into_iter().map(Node::User);
                let cards = command
                    .card_ids()
                    .into_iter()
                    .map(|card| Node::Card(card.as_str()));
                for node in users.chain(cards) {
                    let id = *nodes.entry(node).or_insert_with(|| sets.add());
                    sets.union(anchor, id);
                }
                anchors.push(anchor);
            }

            anchors
                .into_iter()
                .map(|anchor| sets.find(anchor))
                .collect::<Vec<_>>()
        };

        let mut groups: Vec<Vec<LedgerCommand>> = Vec::new();
        let mut slots: HashMap<usize, usize> = HashMap::new();
        for (command, root) in batch.into_iter().zip(roots) {
            let slot = *slots.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(command);
        }
        groups
    }

    /// Apply a group of dependent commands in order
    pub async fn process_group(&self, commands: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        commands
            .into_iter()
            .map(|command| ProcessingResult::apply(&self.exchange, command))
            .collect()
    }

    /// Apply a batch, running independent groups concurrently
    ///
    /// Results come back grouped, not in file order. Every command is applied
    /// even if earlier ones fail.
    pub async fn process_batch(&self, batch: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(batch.len());
        let mut segment = Vec::new();

        for command in batch {
            if command.participants().is_empty() {
                results.extend(self.process_segment(std::mem::take(&mut segment)).await);
                results.push(ProcessingResult::apply(&self.exchange, command));
            } else {
                segment.push(command);
            }
        }
        results.extend(self.process_segment(segment).await);

        results
    }

    async fn process_segment(&self, segment: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        if segment.is_empty() {
            return Vec::new();
        }

        let mut tasks = Vec::new();
        for group in Self::partition(segment) {
            let processor = self.clone();
            tasks.push(tokio::spawn(
                async move { processor.process_group(group).await },
            ));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(group_results) => results.extend(group_results),
                Err(err) => error!(error = %err, "replay task panicked"),
            }
        }
        results
    }
}
