//! Slot table: the fixed array of pooled connections and their lease state

use slotpool_core::{ConnectParams, ConnectionFactory, PoolError, Result};

/// Identity of one loan, unique within a pool
pub(crate) type LeaseId = u64;

/// One fixed position in the pool.
///
/// A leased slot does not hold its connection; the holder's `Lease` does,
/// and hands it back on release.
pub(crate) enum Slot<C> {
    Vacant,
    Idle(C),
    Leased(LeaseId),
}

/// A slot taken by `claim_free`
pub(crate) enum Claim<C> {
    /// An idle connection, now leased
    Ready(usize, C),
    /// A vacant slot reserved for a connection the caller must still open
    Refill(usize, ConnectParams),
}

/// What a fill/validate pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FillReport {
    pub created: usize,
    pub validated: usize,
    pub skipped_leased: usize,
}

/// Fixed-size table of slots, guarded by the pool's slot mutex.
///
/// Slot indexes are stable for the life of the table; reuse swaps the
/// connection object in place.
pub(crate) struct SlotTable<C> {
    slots: Vec<Slot<C>>,
    params: Option<ConnectParams>,
}

impl<C: Send + 'static> SlotTable<C> {
    /// All slots start vacant; the first `open` connects them.
    pub(crate) fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot::Vacant);
        Self {
            slots,
            params: None,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Connect every vacant slot and ping every idle one.
    ///
    /// Any failure closes the connections created during this pass, in
    /// reverse order, before returning. A connection that fails its ping is
    /// closed and its slot vacated. Leased slots are left to their holders.
    pub(crate) fn fill_or_validate<F>(
        &mut self,
        factory: &F,
        params: &ConnectParams,
    ) -> Result<FillReport>
    where
        F: ConnectionFactory<Connection = C>,
    {
        let mut report = FillReport::default();
        let mut created = Vec::with_capacity(self.slots.len());

        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            match slot {
                Slot::Vacant => match factory.connect(params) {
                    Ok(conn) => {
                        *slot = Slot::Idle(conn);
                        created.push(index);
                        report.created += 1;
                    }
                    Err(e) => {
                        tracing::warn!(slot = index, error = %e, "connect failed, rolling back this pass");
                        self.rollback(factory, &created);
                        return Err(PoolError::Connect {
                            slot: index,
                            reason: e.to_string(),
                        });
                    }
                },
                Slot::Idle(conn) => {
                    if let Err(e) = factory.ping(conn) {
                        tracing::warn!(slot = index, error = %e, "reused connection failed its ping");
                        if let Slot::Idle(conn) = std::mem::replace(slot, Slot::Vacant) {
                            factory.close(conn);
                        }
                        self.rollback(factory, &created);
                        return Err(PoolError::Reconnect {
                            slot: index,
                            reason: e.to_string(),
                        });
                    }
                    report.validated += 1;
                }
                Slot::Leased(_) => report.skipped_leased += 1,
            }
        }

        self.params = Some(params.clone());
        Ok(report)
    }

    fn rollback<F>(&mut self, factory: &F, created: &[usize])
    where
        F: ConnectionFactory<Connection = C>,
    {
        for &index in created.iter().rev() {
            if let Slot::Idle(conn) = std::mem::replace(&mut self.slots[index], Slot::Vacant) {
                factory.close(conn);
                tracing::debug!(slot = index, "closed connection created in failed pass");
            }
        }
    }

    /// Lease the lowest-index idle slot, or reserve the lowest vacant one.
    ///
    /// A reserved slot is marked leased before its connection exists so the
    /// caller can connect without holding the slot lock.
    pub(crate) fn claim_free(&mut self, id: LeaseId) -> Result<Claim<C>> {
        if let Some(index) = self.slots.iter().position(|s| matches!(s, Slot::Idle(_))) {
            if let Slot::Idle(conn) = std::mem::replace(&mut self.slots[index], Slot::Leased(id)) {
                return Ok(Claim::Ready(index, conn));
            }
        }

        if let Some(index) = self.slots.iter().position(|s| matches!(s, Slot::Vacant)) {
            let params = self.params.clone().ok_or(PoolError::NotInitialized)?;
            self.slots[index] = Slot::Leased(id);
            return Ok(Claim::Refill(index, params));
        }

        Err(PoolError::NoFreeSlot)
    }

    /// Put a lent connection back into the slot it was taken from.
    ///
    /// On mismatch the connection is handed back so the caller can close it.
    pub(crate) fn release_slot(
        &mut self,
        index: usize,
        id: LeaseId,
        conn: C,
    ) -> std::result::Result<(), (PoolError, C)> {
        match self.slots.get(index) {
            Some(Slot::Leased(held)) if *held == id => {
                self.slots[index] = Slot::Idle(conn);
                Ok(())
            }
            _ => Err((PoolError::NoLeasedSlot { slot: index }, conn)),
        }
    }

    /// Mark a leased slot empty after its holder discarded the connection
    pub(crate) fn vacate(&mut self, index: usize, id: LeaseId) -> Result<()> {
        match self.slots.get(index) {
            Some(Slot::Leased(held)) if *held == id => {
                self.slots[index] = Slot::Vacant;
                Ok(())
            }
            _ => Err(PoolError::NoLeasedSlot { slot: index }),
        }
    }

    /// Close every pooled connection and leave all slots vacant.
    ///
    /// Returns how many connections were closed.
    pub(crate) fn drain_and_close<F>(&mut self, factory: &F) -> usize
    where
        F: ConnectionFactory<Connection = C>,
    {
        let mut closed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            match std::mem::replace(slot, Slot::Vacant) {
                Slot::Idle(conn) => {
                    factory.close(conn);
                    closed += 1;
                }
                Slot::Leased(id) => {
                    tracing::error!(slot = index, lease = id, "slot still leased during teardown");
                    *slot = Slot::Leased(id);
                }
                Slot::Vacant => {}
            }
        }
        closed
    }

    pub(crate) fn leased_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Leased(_)))
            .count()
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Idle(_)))
            .count()
    }

    pub(crate) fn vacant_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Vacant))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn is_leased(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Slot::Leased(_)))
    }
}
